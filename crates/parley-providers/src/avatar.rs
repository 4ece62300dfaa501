//! DiceBear avatar URLs for freshly created contacts.

use parley_core::traits::AvatarProvider;
use rand::seq::SliceRandom;

const STYLES: &[&str] = &[
    "adventurer",
    "adventurer-neutral",
    "avataaars",
    "avataaars-neutral",
    "big-ears",
    "big-ears-neutral",
    "big-smile",
    "bottts",
    "bottts-neutral",
    "croodles",
    "croodles-neutral",
    "dylan",
    "fun-emoji",
    "glass",
    "icons",
    "identicon",
    "initials",
    "lorelei",
    "lorelei-neutral",
    "micah",
    "miniavs",
    "notionists",
    "notionists-neutral",
    "open-peeps",
    "personas",
    "pixel-art",
    "pixel-art-neutral",
    "rings",
    "shapes",
    "thumbs",
];

/// Picks a random DiceBear style per contact.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiceBearAvatars;

impl AvatarProvider for DiceBearAvatars {
    fn generate(&self, seed: &str) -> String {
        let style = STYLES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("identicon");
        format!("https://api.dicebear.com/9.x/{style}/svg?seed={seed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_url_shape() {
        let url = DiceBearAvatars.generate("jane");
        assert!(url.starts_with("https://api.dicebear.com/9.x/"));
        assert!(url.ends_with("/svg?seed=jane"));
        let style = url
            .trim_start_matches("https://api.dicebear.com/9.x/")
            .split('/')
            .next()
            .unwrap();
        assert!(STYLES.contains(&style));
    }
}
