//! Post-processing chain run over the final blob.
//!
//! Processors run in order. Each one may modify the blob and may disable
//! other processors of the same run, e.g. a checksum verifier turning off
//! the checksum updater when there is no checksum field to update.

use std::fmt;

use tracing::debug;

use crate::error::Result;
use crate::symbol::{Layout, SymbolList};

use super::checksum::{ChecksumMode, ChecksumProcessor};
use super::ConversionContext;

/// One step of the post-processing chain.
pub trait PostProcessor: fmt::Debug {
    /// Name used to enable or disable the processor.
    fn name(&self) -> &'static str;

    /// Processes the blob, returning the number of changes made.
    ///
    /// A processor changing a symbol's bytes snapshots the symbol first.
    fn process(
        &self,
        ctx: &ConversionContext,
        blob: &mut [u8],
        symbols: &mut SymbolList,
        chain: &mut ChainControl<'_>,
    ) -> Result<usize>;
}

/// Handle given to a running processor to control the rest of the chain.
#[derive(Debug)]
pub struct ChainControl<'a> {
    names: &'a [&'static str],
    enabled: &'a mut [bool],
}

impl ChainControl<'_> {
    /// Disables every processor with the given name.
    ///
    /// Returns whether such a processor exists.
    pub fn disable(&mut self, name: &str) -> bool {
        set_enabled(self.names, self.enabled, name, false)
    }

    /// Whether a processor with the given name is present and enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        is_enabled(self.names, self.enabled, name)
    }
}

/// Ordered list of post-processors.
#[derive(Debug, Default)]
pub struct PostProcessChain {
    processors: Vec<Box<dyn PostProcessor>>,
    names: Vec<&'static str>,
    enabled: Vec<bool>,
}

impl PostProcessChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the standard chain: checksum verification, then update.
    pub fn with_defaults() -> Self {
        let mut chain = Self::new();
        chain.push(ChecksumProcessor::new(ChecksumMode::Verify));
        chain.push(ChecksumProcessor::new(ChecksumMode::Update));
        chain
    }

    /// Appends an enabled processor.
    pub fn push<P: PostProcessor + 'static>(&mut self, processor: P) {
        self.names.push(processor.name());
        self.processors.push(Box::new(processor));
        self.enabled.push(true);
    }

    /// Number of processors, enabled or not.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Whether the chain has no processors.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Disables every processor with the given name.
    pub fn disable(&mut self, name: &str) -> bool {
        set_enabled(&self.names, &mut self.enabled, name, false)
    }

    /// Re-enables every processor with the given name.
    pub fn enable(&mut self, name: &str) -> bool {
        set_enabled(&self.names, &mut self.enabled, name, true)
    }

    /// Whether a processor with the given name is present and enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        is_enabled(&self.names, &self.enabled, name)
    }

    /// Runs all enabled processors in order.
    ///
    /// Returns the sum of the change counts, or the first error, in which
    /// case the remaining processors do not run. Processors disabled during
    /// the run stay disabled.
    pub fn run(
        &mut self,
        ctx: &ConversionContext,
        blob: &mut [u8],
        symbols: &mut SymbolList,
    ) -> Result<usize> {
        let mut total = 0;

        for (index, processor) in self.processors.iter().enumerate() {
            if !self.enabled[index] {
                debug!("Skipping disabled post-processor {}", processor.name());
                continue;
            }

            let mut control = ChainControl {
                names: &self.names,
                enabled: &mut self.enabled,
            };
            let changes = processor.process(ctx, blob, symbols, &mut control)?;
            debug!("Post-processor {}: {} changes", processor.name(), changes);
            total += changes;
        }

        Ok(total)
    }
}

/// Runs a post-processing chain over a layout.
pub fn post_process(
    ctx: &ConversionContext,
    chain: &mut PostProcessChain,
    layout: &mut Layout,
) -> Result<usize> {
    ctx.info(&format!("Post-processing {} bytes...", layout.blob().len()));
    let (blob, symbols) = layout.parts_mut();
    chain.run(ctx, blob, symbols)
}

fn set_enabled(names: &[&'static str], enabled: &mut [bool], name: &str, value: bool) -> bool {
    let mut found = false;
    for (candidate, flag) in names.iter().zip(enabled.iter_mut()) {
        if *candidate == name {
            *flag = value;
            found = true;
        }
    }
    found
}

fn is_enabled(names: &[&'static str], enabled: &[bool], name: &str) -> bool {
    names
        .iter()
        .zip(enabled)
        .any(|(candidate, flag)| *candidate == name && *flag)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::Error;

    #[derive(Debug)]
    struct Counter {
        name: &'static str,
        changes: usize,
        disables: Option<&'static str>,
        fail: bool,
        runs: Cell<usize>,
    }

    impl Counter {
        fn new(name: &'static str, changes: usize) -> Self {
            Self {
                name,
                changes,
                disables: None,
                fail: false,
                runs: Cell::new(0),
            }
        }
    }

    impl PostProcessor for Counter {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process(
            &self,
            _ctx: &ConversionContext,
            blob: &mut [u8],
            _symbols: &mut SymbolList,
            chain: &mut ChainControl<'_>,
        ) -> Result<usize> {
            self.runs.set(self.runs.get() + 1);
            if self.fail {
                return Err(Error::PostProcess {
                    name: self.name.to_string(),
                    reason: "failed".to_string(),
                });
            }
            if let Some(other) = self.disables {
                chain.disable(other);
            }
            blob[0] = blob[0].wrapping_add(1);
            Ok(self.changes)
        }
    }

    #[test]
    fn test_run_sums_changes() {
        let ctx = ConversionContext::builtin();
        let mut chain = PostProcessChain::new();
        chain.push(Counter::new("a", 1));
        chain.push(Counter::new("b", 2));

        let mut blob = [0u8; 1];
        assert_eq!(chain.run(&ctx, &mut blob, &mut SymbolList::new()).unwrap(), 3);
        assert_eq!(blob, [2]);
    }

    #[test]
    fn test_processor_disables_later_one() {
        let ctx = ConversionContext::builtin();
        let mut chain = PostProcessChain::new();
        let mut first = Counter::new("first", 1);
        first.disables = Some("second");
        chain.push(first);
        chain.push(Counter::new("second", 5));

        let mut blob = [0u8; 1];
        assert_eq!(chain.run(&ctx, &mut blob, &mut SymbolList::new()).unwrap(), 1);
        assert!(!chain.is_enabled("second"));
        assert!(chain.is_enabled("first"));
    }

    #[test]
    fn test_error_stops_chain() {
        let ctx = ConversionContext::builtin();
        let mut chain = PostProcessChain::new();
        let mut failing = Counter::new("failing", 0);
        failing.fail = true;
        chain.push(failing);
        chain.push(Counter::new("after", 1));

        let mut blob = [0u8; 1];
        let err = chain.run(&ctx, &mut blob, &mut SymbolList::new()).unwrap_err();
        assert!(matches!(err, Error::PostProcess { .. }));
        assert_eq!(blob, [0]);
    }

    #[test]
    fn test_disable_by_name() {
        let mut chain = PostProcessChain::with_defaults();
        assert_eq!(chain.len(), 2);
        assert!(chain.disable(ChecksumMode::Update.processor_name()));
        assert!(!chain.is_enabled(ChecksumMode::Update.processor_name()));
        assert!(!chain.disable("nonexistent"));
        assert!(chain.enable(ChecksumMode::Update.processor_name()));
    }
}
