//! Record ids and invitation keys.

use rand::seq::SliceRandom;
use ulid::Ulid;

/// Words drawn for invitation keys. Lowercase ASCII only so keys survive
/// being typed, pasted into URLs and read aloud.
const WORDS: &[&str] = &[
    "amber", "anchor", "apple", "arrow", "aspen", "badger", "basil", "beacon", "birch", "bison",
    "bramble", "breeze", "brook", "cactus", "canyon", "cedar", "cherry", "cinder", "clover",
    "comet", "coral", "cotton", "crane", "crystal", "dawn", "delta", "dune", "eagle", "ember",
    "falcon", "fern", "fjord", "flint", "fox", "frost", "garnet", "glacier", "granite", "harbor",
    "hazel", "heron", "hollow", "indigo", "iris", "island", "ivy", "jade", "juniper", "kestrel",
    "lagoon", "lantern", "lark", "laurel", "lemon", "lilac", "linen", "lotus", "lynx", "maple",
    "marble", "meadow", "mesa", "mint", "moss", "nectar", "nova", "oak", "ocean", "olive",
    "onyx", "orbit", "otter", "pebble", "pepper", "pine", "plume", "prairie", "quartz", "quill",
    "raven", "reef", "ridge", "river", "robin", "saffron", "sage", "salmon", "sierra", "slate",
    "sparrow", "spruce", "summit", "thistle", "thunder", "tide", "timber", "tulip", "tundra",
    "valley", "velvet", "violet", "walnut", "willow", "wren", "yarrow", "zephyr",
];

const KEY_WORDS: usize = 3;

/// Generates a new record id: a lowercase ULID.
pub(crate) fn record_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

/// Generates a three-word invitation key such as `"cedar-otter-lantern"`.
pub(crate) fn invitation_key() -> String {
    let mut rng = rand::thread_rng();
    WORDS
        .choose_multiple(&mut rng, KEY_WORDS)
        .copied()
        .collect::<Vec<_>>()
        .join("-")
}
