/// Reads an environment variable, treating blank values as unset.
pub fn env_key(key: &str) -> Option<String> {
  non_blank(std::env::var(key).ok())
}

pub fn non_blank(value: Option<String>) -> Option<String> {
  value
    .map(|value| value.trim().to_owned())
    .filter(|value| !value.is_empty())
}
