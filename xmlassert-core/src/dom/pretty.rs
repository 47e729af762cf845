use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

/// Re-indent an XML payload for log output. Input that does not parse is returned
/// unchanged.
pub fn pretty_print(xml: &str) -> String {
    let mut reader = Reader::from_str(xml.trim());
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(event) => {
                if writer.write_event(event).is_err() {
                    return xml.to_string();
                }
            }
            Err(_) => return xml.to_string(),
        }
    }

    String::from_utf8(writer.into_inner()).unwrap_or_else(|_| xml.to_string())
}

#[cfg(test)]
mod tests {
    use super::pretty_print;

    #[test]
    fn indents_nested_elements() {
        let pretty = pretty_print("<A><B>x</B><C/></A>");
        assert_eq!(pretty, "<A>\n  <B>x</B>\n  <C/>\n</A>");
    }

    #[test]
    fn returns_broken_input_unchanged() {
        assert_eq!(pretty_print("<A><B></A>"), "<A><B></A>");
    }
}
