//! Test data generators and validators

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

use crate::pages::{Category, ItemData, Priority, RegisterData, DEPARTMENTS};

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("valid regex"));

const PASSWORD_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$";
const FIRST_NAMES: [&str; 6] = ["João", "Maria", "Pedro", "Ana", "Carlos", "Lucia"];
const LAST_NAMES: [&str; 6] = ["Silva", "Santos", "Oliveira", "Souza", "Lima", "Costa"];
const ITEM_KINDS: [&str; 5] = ["Tarefa", "Projeto", "Reunião", "Relatório", "Análise"];
const ADJECTIVES: [&str; 5] = ["Importante", "Urgente", "Crítico", "Estratégico", "Essencial"];

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Millisecond timestamp plus a process-wide counter, so two calls in the
/// same millisecond still differ.
fn unique_suffix() -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}{:03}", Utc::now().timestamp_millis(), seq % 1000)
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}_{}@email.com", prefix, unique_suffix())
}

pub fn unique_name(prefix: &str) -> String {
    format!("{} {}", prefix, unique_suffix())
}

/// A Brazilian mobile number: two-digit area code, `9`, eight digits.
pub fn phone_number() -> String {
    let mut rng = rand::thread_rng();
    let area: u32 = rng.gen_range(10..100);
    let number: u32 = rng.gen_range(10_000_000..100_000_000);
    format!("{}9{}", area, number)
}

pub fn secure_password(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| PASSWORD_CHARS[rng.gen_range(0..PASSWORD_CHARS.len())] as char)
        .collect()
}

fn pick<T: Copy, const N: usize>(choices: &[T; N]) -> T {
    choices[rand::thread_rng().gen_range(0..N)]
}

/// A valid random registration.
pub fn user_data() -> RegisterData {
    let first = pick(&FIRST_NAMES);
    let last = pick(&LAST_NAMES);
    RegisterData {
        name: format!("{} {}", first, last),
        email: unique_email(&first.to_lowercase()),
        phone: phone_number(),
        department: pick(&DEPARTMENTS).to_string(),
        password: "123456".to_string(),
        confirm_password: "123456".to_string(),
        newsletter: rand::thread_rng().gen_bool(0.5),
    }
}

/// A random item with a unique name.
pub fn item_data() -> ItemData {
    let kind = pick(&ITEM_KINDS);
    let adjective = pick(&ADJECTIVES);
    ItemData {
        name: format!("{} {} {}", adjective, kind, unique_suffix()),
        description: format!(
            "Descrição detalhada do {} {}",
            kind.to_lowercase(),
            adjective.to_lowercase()
        ),
        priority: pick(&Priority::ALL),
        category: pick(&Category::ALL),
    }
}

/// `count` random items named `<base> 1`, `<base> 2`, ...
pub fn multiple_items(count: usize, base: &str) -> Vec<ItemData> {
    (1..=count)
        .map(|i| ItemData {
            name: format!("{} {}", base, i),
            ..item_data()
        })
        .collect()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Ten or eleven digits once formatting is stripped.
pub fn is_valid_brazilian_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    (10..=11).contains(&digits)
}

/// Lowercase, strip punctuation, and hyphenate whitespace.
pub fn sanitize_for_test_id(s: &str) -> String {
    let lower = s.to_lowercase();
    let stripped = NON_WORD.replace_all(&lower, "");
    let hyphenated = SPACES.replace_all(&stripped, "-");
    DASHES.replace_all(&hyphenated, "-").trim().to_string()
}

/// Random delay between 100 and 600 ms, in milliseconds.
pub fn human_delay_ms() -> u64 {
    rand::thread_rng().gen_range(100..600)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn unique_values_differ() {
        assert_ne!(unique_email("qa"), unique_email("qa"));
        assert!(unique_email("qa").starts_with("qa_"));
        assert_ne!(unique_name("Item"), unique_name("Item"));
    }

    #[test]
    fn generated_users_pass_the_form_rules() {
        for _ in 0..20 {
            let user = user_data();
            assert!(is_valid_email(&user.email), "{}", user.email);
            assert!(is_valid_brazilian_phone(&user.phone), "{}", user.phone);
            assert_eq!(user.password, user.confirm_password);
            assert!(DEPARTMENTS.contains(&user.department.as_str()));
        }
    }

    #[test]
    fn multiple_items_are_numbered() {
        let items = multiple_items(3, "Lote");
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Lote 1", "Lote 2", "Lote 3"]);
    }

    #[test]
    fn passwords_have_requested_length() {
        assert_eq!(secure_password(12).chars().count(), 12);
    }

    #[test_case("teste@email.com", true)]
    #[test_case("email-invalido", false)]
    #[test_case("invalid@email", false)]
    #[test_case("a b@c.com", false)]
    fn email_validation(email: &str, valid: bool) {
        assert_eq!(is_valid_email(email), valid);
    }

    #[test_case("11999999999", true)]
    #[test_case("(11) 9999-9999", true)]
    #[test_case("123", false)]
    #[test_case("119999999999", false)]
    fn phone_validation(phone: &str, valid: bool) {
        assert_eq!(is_valid_brazilian_phone(phone), valid);
    }

    #[test_case("Item de Exemplo 1", "item-de-exemplo-1")]
    #[test_case("Novo   Item!!", "novo-item")]
    #[test_case("a - b", "a-b")]
    fn test_id_sanitizer(input: &str, expected: &str) {
        assert_eq!(sanitize_for_test_id(input), expected);
    }
}
