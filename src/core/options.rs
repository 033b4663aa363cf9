//! Code generation options.

/// Knobs that change the emitted assembly without changing its behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Emit `# ...` comments describing the source construct behind each
    /// instruction group.
    pub annotate: bool,
}

impl CodegenOptions {
    pub fn with_annotations(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self { annotate: true }
    }
}
