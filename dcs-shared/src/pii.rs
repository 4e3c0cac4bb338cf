use std::fmt;

/// Wraps a travel-document number (or any identifier) so that `Debug` and
/// `Display` only reveal its last two characters.
///
/// Intended for log statements: `info!(document = %Masked(&p.document_number), ...)`.
#[derive(Clone, Copy)]
pub struct Masked<T>(pub T);

impl<T: AsRef<str>> Masked<T> {
    fn tail(&self) -> &str {
        let s = self.0.as_ref();
        let start = s
            .char_indices()
            .rev()
            .nth(1)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        &s[start..]
    }
}

impl<T: AsRef<str>> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"****{}\"", self.tail())
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "****{}", self.tail())
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}
