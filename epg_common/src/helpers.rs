/// Masks an identifier for log output, keeping only the first five characters.
pub fn mask(value: &str) -> String {
    let mut chars = value.chars();
    let prefix: String = chars.by_ref().take(5).collect();
    if chars.next().is_some() {
        format!("{prefix}***")
    } else if value.is_empty() {
        "?".to_string()
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mask_keeps_a_short_prefix() {
        assert_eq!(mask("a1b2c3d4e5f6"), "a1b2c***");
        assert_eq!(mask("abc"), "***");
        assert_eq!(mask(""), "?");
    }
}
