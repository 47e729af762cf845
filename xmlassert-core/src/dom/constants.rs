pub(crate) const XMLNS_ATTRIBUTE: &str = "xmlns";

/// Prefix generated for `{uri}local` steps in XPath expressions.
pub(crate) const DYNAMIC_NS_PREFIX: &str = "dns";
pub(crate) const DYNAMIC_NS_START: char = '{';
pub(crate) const DYNAMIC_NS_END: char = '}';
