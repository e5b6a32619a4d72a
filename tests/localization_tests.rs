use photoshoot_bot::localization::{t_args_lang, t_lang};

#[test]
fn test_english_lookup() {
    let message = t_lang("cancelled", None);
    assert!(message.contains("cancelled"), "got: {message}");
}

#[test]
fn test_russian_lookup() {
    let message = t_lang("cancelled", Some("ru"));
    assert!(message.contains("отменено"), "got: {message}");
}

#[test]
fn test_unsupported_locale_falls_back_to_english() {
    assert_eq!(t_lang("cancelled", Some("de")), t_lang("cancelled", None));
}

#[test]
fn test_region_code_resolves_to_base_language() {
    assert_eq!(
        t_lang("cancelled", Some("ru-RU")),
        t_lang("cancelled", Some("ru"))
    );
}

#[test]
fn test_argument_substitution() {
    let message = t_args_lang("credits-balance", None, &[("credits", "42".to_string())]);
    assert!(message.contains("42"), "got: {message}");
}

#[test]
fn test_missing_key_reports_itself() {
    assert_eq!(
        t_lang("no-such-key", None),
        "Missing translation: no-such-key"
    );
}
