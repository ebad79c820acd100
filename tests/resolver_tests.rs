mod common;

use common::contacts;
use parley::kernel::confirm::{ConfirmationMatcher, PhraseClass};
use parley::kernel::contacts::{clean_token, normalize_address, ContactDirectory};
use parley::AgentError;

#[test]
fn test_confirmation_classes() {
    let matcher = ConfirmationMatcher::new();
    assert_eq!(matcher.classify("Yes!"), Some(PhraseClass::Affirmative));
    assert_eq!(matcher.classify("yeah go ahead"), Some(PhraseClass::Affirmative));
    assert_eq!(matcher.classify("nope"), Some(PhraseClass::Negative));
    // Negative is checked before cancel.
    assert_eq!(matcher.classify("never mind"), Some(PhraseClass::Negative));
    assert_eq!(matcher.classify("abort"), Some(PhraseClass::Cancel));
    assert_eq!(matcher.classify("okay"), Some(PhraseClass::Filler));
    assert_eq!(matcher.classify("what is paris like"), None);
    assert_eq!(matcher.classify("   "), None);
}

#[test]
fn test_class_predicates_in_isolation() {
    let matcher = ConfirmationMatcher::new();
    assert!(matcher.is_cancel("never mind"));
    assert!(matcher.is_cancel("forget it"));
    assert!(!matcher.is_cancel("tell her I'm running late"));
    assert!(matcher.is_filler("ok"));
    assert!(matcher.matches(PhraseClass::Negative, "no"));
    assert!(!matcher.is_affirmative("hello there"));
}

#[test]
fn test_filler_requires_short_utterance() {
    let matcher = ConfirmationMatcher::new();
    assert!(matcher.is_filler("okay sure"));
    assert!(!matcher.is_filler("okay tell her the meeting moved"));
}

#[test]
fn test_marta_fuzzy_needs_confirmation() {
    let directory = ContactDirectory::new([("marta jones", "marta@x.com")]);
    let resolution = directory.resolve("marta");
    assert_eq!(resolution.address.as_deref(), Some("marta@x.com"));
    assert!(resolution.needs_confirmation);
}

#[test]
fn test_exact_name_and_stop_words() {
    let directory = contacts();
    let exact = directory.resolve("John Smith");
    assert_eq!(exact.address.as_deref(), Some("john@example.com"));
    assert!(!exact.needs_confirmation);

    let with_stop_words = directory.resolve("my friend john smith");
    assert_eq!(with_stop_words.address.as_deref(), Some("john@example.com"));
    assert!(!with_stop_words.needs_confirmation);

    let empty = directory.resolve("my sister");
    assert_eq!(empty.address, None);
    assert!(!empty.needs_confirmation);
}

#[test]
fn test_single_word_match() {
    let directory = contacts();
    let resolution = directory.resolve("jones");
    assert_eq!(resolution.address.as_deref(), Some("marta@x.com"));
    assert!(resolution.needs_confirmation);
}

#[test]
fn test_unknown_name_misses() {
    let resolution = contacts().resolve("xavier");
    assert_eq!(resolution.address, None);
    assert!(!resolution.needs_confirmation);
}

#[test]
fn test_address_resolution_is_idempotent() {
    let directory = contacts();
    for input in ["Marta@X.com", "someone@example.org", "john.smith @ example.com"] {
        let first = directory.resolve(input);
        assert!(!first.needs_confirmation);
        let address = first.address.clone().unwrap();
        assert_eq!(directory.resolve(&address), first, "{}", input);
    }
}

#[test]
fn test_spoken_address_forms() {
    assert_eq!(normalize_address("John at Gmail dot com"), "john@gmail.com");
    assert_eq!(normalize_address("first underscore last at mail dot org"), "first_last@mail.org");

    let resolution = contacts().resolve("john at gmail dot com");
    assert_eq!(resolution.address.as_deref(), Some("john@gmail.com"));
    assert!(resolution.needs_confirmation);
}

#[test]
fn test_clean_token() {
    assert_eq!(clean_token("My wife, Marta!"), "marta");
    assert_eq!(clean_token("the contact"), "");
}

#[test]
fn test_load_contacts_file() {
    let dir = std::env::temp_dir().join(format!("parley-contacts-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let missing = ContactDirectory::load(&dir.join("absent.json")).unwrap();
    assert!(missing.is_empty());

    let good = dir.join("contacts.json");
    std::fs::write(&good, r#"{ "Marta Jones": "marta@x.com", "Bob": "bob@y.org" }"#).unwrap();
    let directory = ContactDirectory::load(&good).unwrap();
    assert_eq!(directory.len(), 2);
    assert_eq!(directory.get("bob"), Some("bob@y.org"));

    let bad = dir.join("broken.json");
    std::fs::write(&bad, "[1, 2").unwrap();
    assert!(matches!(ContactDirectory::load(&bad), Err(AgentError::Contacts(_))));

    std::fs::remove_dir_all(&dir).ok();
}
