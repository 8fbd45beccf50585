use rand::RngCore;

/// Profile slug: lowercase alias with everything outside `[0-9a-z]` dropped.
/// Falls back to the user id when no alias is set or nothing survives.
pub fn user_url(alias: Option<&str>, user_id: &str) -> String {
    let slug: String = alias
        .unwrap_or_default()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();
    if slug.is_empty() {
        user_id.to_string()
    } else {
        slug
    }
}

/// Collectible slug: lowercase name with everything outside `[0-9a-z-]`
/// replaced by `-`, followed by 6 random bytes in hex.
pub fn collectible_url(name: &str) -> String {
    let base: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{}-{}", base, random_hex(6))
}

pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_url_from_alias() {
        assert_eq!(user_url(Some("Stamp_Fan 99!"), "id-1"), "stampfan99");
        assert_eq!(user_url(None, "id-1"), "id-1");
        assert_eq!(user_url(Some("ÉÈ__"), "id-1"), "id-1");
    }

    #[test]
    fn test_collectible_url_shape() {
        let url = collectible_url("My Special Coin!");
        let (base, suffix) = url.rsplit_once('-').unwrap();
        assert_eq!(base, "my-special-coin-");
        assert_eq!(suffix.len(), 12);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_collectible_url_keeps_hyphens() {
        let url = collectible_url("penny-black");
        assert!(url.starts_with("penny-black-"));
        assert_eq!(url.len(), "penny-black-".len() + 12);
    }

    #[test]
    fn test_collectible_urls_differ() {
        assert_ne!(collectible_url("coin"), collectible_url("coin"));
    }
}
