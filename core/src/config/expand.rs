//! Placeholder and home-directory expansion for configuration values.

/// Replace every `${env:NAME}` with the value of the environment variable
/// `NAME`. Unset variables expand to an empty string; an unterminated
/// placeholder is kept verbatim.
pub fn expand_env_placeholders(input: &str) -> String {
    const OPEN: &str = "${env:";
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find(OPEN) {
        output.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                output.push_str(&std::env::var(name).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}

/// Expand a leading `~` to the current user's home directory.
pub fn expand_tilde(input: &str) -> String {
    shellexpand::tilde(input).into_owned()
}
