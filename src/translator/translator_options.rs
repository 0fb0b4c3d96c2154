/// Switches that change how SQL maps onto FetchXML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslatorOptions {
    /// The platform accepts `valueof` conditions comparing two attributes.
    pub column_comparison_available: bool,
    /// `"text"` is an identifier. When off, a double-quoted name that matches no column
    /// is read as a string literal.
    pub quoted_identifiers: bool,
}

impl Default for TranslatorOptions {
    fn default() -> Self {
        Self { column_comparison_available: false, quoted_identifiers: true }
    }
}

impl TranslatorOptions {
    pub fn with_column_comparison(mut self, available: bool) -> Self {
        self.column_comparison_available = available;
        self
    }

    pub fn with_quoted_identifiers(mut self, enabled: bool) -> Self {
        self.quoted_identifiers = enabled;
        self
    }
}
