//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// True if the char is in the Arabic, Arabic Supplement or Arabic Presentation Forms blocks.
pub fn is_arabic(ch: char) -> bool {
  ('\u{0600}'..='\u{06FF}').contains(&ch)
    || ('\u{0750}'..='\u{077F}').contains(&ch)
    || ('\u{08A0}'..='\u{08FF}').contains(&ch)
    || ('\u{FB50}'..='\u{FDFF}').contains(&ch)
    || ('\u{FE70}'..='\u{FEFF}').contains(&ch)
}

/// Log-safe truncation for large strings, on a char boundary.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) { end -= 1; }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_every_occurrence() {
    let out = fill_template("{a} and {a} but {b}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and x but y");
  }

  #[test]
  fn detects_arabic_graphemes() {
    assert!(is_arabic('ب'));
    assert!(is_arabic('ي'));
    assert!(!is_arabic('b'));
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    let s = "بببببب";
    let t = trunc_for_log(s, 3);
    assert!(t.starts_with('ب'));
    assert!(t.contains("bytes total"));
  }
}
