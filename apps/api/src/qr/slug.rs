use uuid::Uuid;

/// Length of public scan slugs. 8 hex chars keep scan URLs short while
/// leaving collisions to the unique index.
const SLUG_LEN: usize = 8;

/// Generates a short public slug for a QR code.
pub fn generate_slug() -> String {
    Uuid::new_v4().simple().to_string()[..SLUG_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_shape() {
        let slug = generate_slug();
        assert_eq!(slug.len(), SLUG_LEN);
        assert!(slug.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(slug, slug.to_lowercase());
    }

    #[test]
    fn test_slugs_are_distinct() {
        assert_ne!(generate_slug(), generate_slug());
    }
}
