use crate::code::parser::{Form, ParseError, Parser};
use crate::code::print::write_compact;

/// Size-reduce step-code source: comments and redundant whitespace go, the
/// form tree stays identical.
pub fn minify(source: &str) -> Result<String, ParseError> {
    let forms = Parser::new(source, 0).forms()?;
    Ok(compact_all(&forms))
}

/// Compact a sequence of top-level forms.
pub fn compact_all(forms: &[Form]) -> String {
    let mut out = String::new();
    let mut previous_is_word = false;
    for form in forms {
        let is_word = matches!(form, Form::Atom(..));
        if previous_is_word && is_word {
            out.push(' ');
        }
        write_compact(&mut out, form);
        previous_is_word = is_word;
    }
    out
}
