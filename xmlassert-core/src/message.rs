/// A message under test: an XML payload plus optional XML header fragments.
///
/// # Examples
/// ```rust
/// use xmlassert_core::message::Message;
///
/// let message = Message::new("<Order/>").with_header_data("<Header id=\"1\"/>");
/// assert_eq!(message.header_data().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    payload: String,
    header_data: Vec<String>,
}

impl Message {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            header_data: Vec::new(),
        }
    }

    pub fn with_header_data(mut self, fragment: impl Into<String>) -> Self {
        self.header_data.push(fragment.into());
        self
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn header_data(&self) -> &[String] {
        &self.header_data
    }

    pub fn has_payload(&self) -> bool {
        !self.payload.trim().is_empty()
    }
}
