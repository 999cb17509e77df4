//! Pet profiles.
//!
//! A profile controls the pet's display name and the flavor of the fake
//! editor window it drags across the screen: its title, the intro text, the
//! pool of nonsense chunks it types, and how likely it is to start typing at
//! all while the editor lingers.

/// A selectable pet personality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PetProfile {
    /// Stable identifier used in settings and on the CLI.
    pub id: &'static str,
    /// Display name used in notifications and the HUD.
    pub name: &'static str,
    /// Title of the fake editor window.
    pub editor_title: &'static str,
    /// Text inserted into the fake editor when it opens.
    pub editor_intro: &'static str,
    /// Pool of chunks typed during the linger stage.
    pub editor_chunks: &'static [&'static str],
    /// Chance to start the typing sub-loop when mischief mode is on.
    pub editor_typing_chance: f64,
}

const CUBE: PetProfile = PetProfile {
    id: "cube",
    name: "CubePet",
    editor_title: "annoying_editor.txt - Notepad",
    editor_intro: "HEHEHEHA\n\nich zieh den editor einfach von der seite rein.\ndu tippst? nein, ich tippe.\n",
    editor_chunks: &[
        "Halllllo ",
        "HEHEHEHA ",
        "lol ",
        "du kannst nix machen ",
        "hehe ",
        "hmmmm ",
    ],
    editor_typing_chance: 0.16,
};

const AKI: PetProfile = PetProfile {
    id: "aki",
    name: "Aki",
    editor_title: "aki_notes.txt - Notepad",
    editor_intro: "Aki\n\nwenn du ne text datei offen hast...\nschreib ich random kacke rein.\nfuetter mich mit daten.\n",
    editor_chunks: &[
        "aki sagt: ",
        "kacke ",
        "hehe ",
        "gib daten ",
        "lol ",
        "du tippst? ich tippe. ",
    ],
    editor_typing_chance: 0.25,
};

const PAMUK: PetProfile = PetProfile {
    id: "pamuk",
    name: "Pamuk",
    editor_title: "pamuk_devstuff.txt - Notepad",
    editor_intro: "PamukDevStuff\n\nfuettern mit daten.\nmach mal ne text datei auf.\n",
    editor_chunks: &[
        "pamuk: ",
        "daten pls ",
        "HEHEHEHA ",
        "random ",
        "hmm ",
        "du kannst nix machen ",
    ],
    editor_typing_chance: 0.18,
};

/// All built-in profiles.
pub const PROFILES: &[PetProfile] = &[CUBE, AKI, PAMUK];

impl PetProfile {
    /// Look up a profile by id. Unknown or empty ids fall back to `cube`.
    pub fn by_id(id: &str) -> &'static PetProfile {
        let wanted = id.trim().to_ascii_lowercase();
        PROFILES
            .iter()
            .find(|p| p.id == wanted)
            .unwrap_or(&PROFILES[0])
    }

    /// Normalize a profile id to one of the known ids.
    pub fn normalize_id(id: &str) -> &'static str {
        Self::by_id(id).id
    }
}
