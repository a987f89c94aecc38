//! Header templates.
//!
//! Headers may contain `<<<name>>>` placeholders that are filled in on every
//! turn. Names missing from the variable map are left as written.

use std::collections::BTreeMap;

/// Variables available to header templates.
pub type TemplateVars = BTreeMap<String, String>;

const OPEN: &str = "<<<";
const CLOSE: &str = ">>>";

/// Substitute every `<<<name>>>` found in `vars`.
pub fn render(template: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(len) = after_open.find(CLOSE) else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = &after_open[..len];
        match vars.get(name.trim()) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str(OPEN);
                out.push_str(name);
                out.push_str(CLOSE);
            }
        }
        rest = &after_open[len + CLOSE.len()..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> TemplateVars {
        TemplateVars::from([
            ("name".to_string(), "Pip".to_string()),
            ("username".to_string(), "Jo".to_string()),
        ])
    }

    #[test]
    fn substitutes_known_names() {
        assert_eq!(
            render("You are <<<name>>>, talking to <<< username >>>.", &vars()),
            "You are Pip, talking to Jo."
        );
    }

    #[test]
    fn unknown_names_stay_verbatim() {
        assert_eq!(render("Today is <<<date>>>", &vars()), "Today is <<<date>>>");
    }

    #[test]
    fn unterminated_placeholder_is_text() {
        assert_eq!(render("a <<<name and more", &vars()), "a <<<name and more");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(render("plain", &vars()), "plain");
        assert_eq!(render("", &vars()), "");
    }
}
