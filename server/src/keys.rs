use rand::Rng;

/// All managed objects live under this prefix. It is also the only
/// access-control boundary the delete handler enforces.
pub const KEY_PREFIX: &str = "uploads/";

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 6;

/// Builds a unique storage key: `uploads/<millis>-<base36 suffix>-<name>`.
///
/// Lexicographic order stays roughly chronological and the random suffix
/// keeps keys non-enumerable. Uniqueness rests on timestamp plus suffix;
/// collisions are negligible and not detected.
pub fn make_key(original_name: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{KEY_PREFIX}{timestamp}-{suffix}-{original_name}")
}

/// Recovers the original file name by dropping the first two hyphen
/// delimited segments of the key.
///
/// Lossy for keys that were not produced by [`make_key`]; the result is
/// display text, never an identifier.
pub fn display_name(key: &str) -> String {
    key.split('-').skip(2).collect::<Vec<_>>().join("-")
}
