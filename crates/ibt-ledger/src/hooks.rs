//! # Host Extension Points
//!
//! The host ledger/valuation engine calls this engine at two defined
//! points, through registered extension traits rather than any runtime
//! patching:
//!
//! - [`LedgerPostProcessor`] — invoked with a voucher's generic postings
//!   before they are written; a processor may replace them wholesale.
//! - [`RepostHook`] — invoked after the host's own repost finishes for a
//!   voucher, so corrections can be re-applied.
//!
//! Registration lives on an explicitly constructed [`LedgerPipeline`]
//! owned by the embedder and is idempotent: registering a processor
//! under an already-taken name is a no-op.

use std::sync::Arc;

use crate::entry::{LedgerLine, VoucherKey};
use crate::rewrite::{rewrite_postings, RewriteOutcome};
use crate::settings::BranchAccountingSettings;
use ibt_doc::TransferDocument;

/// Rewrites a voucher's postings before the host writes them.
pub trait LedgerPostProcessor: Send + Sync {
    /// Stable registration name; duplicate registrations are ignored.
    fn name(&self) -> &'static str;

    /// Transform (or pass through) the postings for a voucher.
    fn process(&self, doc: &TransferDocument, lines: Vec<LedgerLine>) -> Vec<LedgerLine>;
}

/// Reacts to the host's repost finishing for a voucher.
pub trait RepostHook: Send + Sync {
    /// Stable registration name; duplicate registrations are ignored.
    fn name(&self) -> &'static str;

    /// Called once per reposted voucher, with the trigger that caused
    /// the repost.
    fn after_repost(&self, trigger_id: &str, voucher: &VoucherKey);
}

/// The composed extension registry the host calls into. Built once at
/// process start; no global state.
#[derive(Default)]
pub struct LedgerPipeline {
    processors: Vec<Arc<dyn LedgerPostProcessor>>,
    hooks: Vec<Arc<dyn RepostHook>>,
}

impl LedgerPipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a post-processor. Idempotent by name.
    pub fn register_post_processor(&mut self, processor: Arc<dyn LedgerPostProcessor>) {
        if self
            .processors
            .iter()
            .any(|p| p.name() == processor.name())
        {
            return;
        }
        self.processors.push(processor);
    }

    /// Register a repost hook. Idempotent by name.
    pub fn register_repost_hook(&mut self, hook: Arc<dyn RepostHook>) {
        if self.hooks.iter().any(|h| h.name() == hook.name()) {
            return;
        }
        self.hooks.push(hook);
    }

    /// Number of registered post-processors.
    pub fn post_processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Host entry point: run every post-processor over the postings, in
    /// registration order.
    pub fn finalize_postings(
        &self,
        doc: &TransferDocument,
        lines: Vec<LedgerLine>,
    ) -> Vec<LedgerLine> {
        self.processors
            .iter()
            .fold(lines, |lines, p| p.process(doc, lines))
    }

    /// Host entry point: announce a finished repost.
    pub fn repost_finished(&self, trigger_id: &str, voucher: &VoucherKey) {
        for hook in &self.hooks {
            hook.after_repost(trigger_id, voucher);
        }
    }
}

/// The branch-accounting rewrite as a post-processor.
pub struct BranchAccountingProcessor {
    settings: BranchAccountingSettings,
}

impl BranchAccountingProcessor {
    /// Wrap the settings into a registrable processor.
    pub fn new(settings: BranchAccountingSettings) -> Self {
        Self { settings }
    }
}

impl LedgerPostProcessor for BranchAccountingProcessor {
    fn name(&self) -> &'static str {
        "branch_accounting_rewrite"
    }

    fn process(&self, doc: &TransferDocument, lines: Vec<LedgerLine>) -> Vec<LedgerLine> {
        match rewrite_postings(doc, &lines, &self.settings) {
            RewriteOutcome::Rewritten(rows) => rows,
            RewriteOutcome::Unchanged(_) => lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ibt_core::{AccountId, ItemCode, Tin};
    use ibt_doc::{DocRole, TransferLine};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 10).unwrap()
    }

    fn settings() -> BranchAccountingSettings {
        BranchAccountingSettings {
            enabled: true,
            transit_account: Some(AccountId::new("Stock In Transit - L").unwrap()),
            transfer_account: Some(AccountId::new("Branch Transfers - L").unwrap()),
            debtor_account: Some(AccountId::new("Inter Branch Debtors - L").unwrap()),
            creditor_account: Some(AccountId::new("Inter Branch Creditors - L").unwrap()),
            force_rewrite: false,
            cutoff_date: None,
        }
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let mut pipeline = LedgerPipeline::new();
        pipeline.register_post_processor(Arc::new(BranchAccountingProcessor::new(settings())));
        pipeline.register_post_processor(Arc::new(BranchAccountingProcessor::new(settings())));
        assert_eq!(pipeline.post_processor_count(), 1);
    }

    #[test]
    fn pipeline_applies_rewrite_for_in_scope_voucher() {
        let mut pipeline = LedgerPipeline::new();
        pipeline.register_post_processor(Arc::new(BranchAccountingProcessor::new(settings())));

        let mut doc = TransferDocument::new(DocRole::Dispatch, date());
        doc.unit_tin = Some(Tin::new("27UNITHO01").unwrap());
        doc.counterparty_tin = Some(Tin::new("27UNITHO01").unwrap());
        doc.lines.push(TransferLine::new(
            ItemCode::new("X").unwrap(),
            dec!(10),
            dec!(100),
        ));
        doc.rederive_totals();
        doc.submit().unwrap();

        let voucher = VoucherKey::new(doc.role, doc.id);
        let generic = vec![
            LedgerLine::credit(
                AccountId::new("Stores - L").unwrap(),
                dec!(800),
                None,
                voucher,
                date(),
            )
            .as_stock(),
            LedgerLine::debit(
                AccountId::new("Goods Clearing - L").unwrap(),
                dec!(800),
                None,
                voucher,
                date(),
            ),
        ];

        let finalized = pipeline.finalize_postings(&doc, generic.clone());
        assert_eq!(finalized.len(), 4);

        // Out-of-scope voucher passes through untouched.
        let mut outsider = doc.clone();
        outsider.counterparty_tin = Some(Tin::new("29UNITBLR1").unwrap());
        let untouched = pipeline.finalize_postings(&outsider, generic.clone());
        assert_eq!(untouched, generic);
    }

    struct CountingHook(AtomicUsize);

    impl RepostHook for CountingHook {
        fn name(&self) -> &'static str {
            "counting_hook"
        }

        fn after_repost(&self, _trigger_id: &str, _voucher: &VoucherKey) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn repost_hooks_fire_once_each() {
        let hook = Arc::new(CountingHook(AtomicUsize::new(0)));
        let mut pipeline = LedgerPipeline::new();
        pipeline.register_repost_hook(hook.clone());
        pipeline.register_repost_hook(hook.clone());

        let voucher = VoucherKey::new(DocRole::Receipt, ibt_core::DocId::new());
        pipeline.repost_finished("trigger-1", &voucher);
        assert_eq!(hook.0.load(Ordering::SeqCst), 1);
    }
}
