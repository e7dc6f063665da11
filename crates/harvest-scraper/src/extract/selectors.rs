//! The canonical selector table.
//!
//! Each text field lists its candidate selectors in priority order together
//! with a plausibility check. The first candidate whose cleaned text passes
//! the check wins. These selectors track LinkedIn's markup and will need
//! updating whenever the site changes it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    Text,
    Attr(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub selector: &'static str,
    pub source: Source,
}

const fn text(selector: &'static str) -> Candidate {
    Candidate {
        selector,
        source: Source::Text,
    }
}

const fn attr(selector: &'static str, name: &'static str) -> Candidate {
    Candidate {
        selector,
        source: Source::Attr(name),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextField {
    Name,
    BioLine,
    Location,
    About,
    ProfilePicture,
    Industry,
}

pub(crate) struct FieldRule {
    pub field: TextField,
    pub candidates: &'static [Candidate],
    pub accept: fn(&str) -> bool,
}

pub(crate) const FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        field: TextField::Name,
        candidates: &[
            text("h1.text-heading-xlarge"),
            text(".pv-text-details__left-panel h1"),
            text(".pv-top-card h1"),
            text("main h1"),
            text("h1"),
        ],
        accept: plausible_name,
    },
    FieldRule {
        field: TextField::BioLine,
        candidates: &[
            text(".text-body-medium.break-words"),
            text(".pv-text-details__left-panel .text-body-medium"),
            text(".pv-top-card--headline"),
            text(".top-card-layout__headline"),
        ],
        accept: plausible_bio_line,
    },
    FieldRule {
        field: TextField::Location,
        candidates: &[
            text(".text-body-small.inline.t-black--light.break-words"),
            text(".pv-text-details__left-panel .text-body-small"),
            text(".pv-top-card--list-bullet li"),
            text(".top-card__subline-item"),
        ],
        accept: plausible_location,
    },
    FieldRule {
        field: TextField::About,
        candidates: &[
            text("#about ~ .display-flex .inline-show-more-text span[aria-hidden=true]"),
            text(".pv-about__summary-text"),
            text("section.summary p"),
        ],
        accept: plausible_about,
    },
    FieldRule {
        field: TextField::ProfilePicture,
        candidates: &[
            attr("img.pv-top-card-profile-picture__image", "src"),
            attr(".pv-top-card__photo img", "src"),
            attr("img.profile-photo-edit__preview", "src"),
        ],
        accept: plausible_picture,
    },
    FieldRule {
        field: TextField::Industry,
        candidates: &[
            text(".pv-text-details__right-panel .inline-show-more-text"),
            text(".top-card-layout__first-subline .industry"),
        ],
        accept: plausible_industry,
    },
];

/// Elements scanned for "N connections" / "N followers" text.
pub(crate) const COUNT_SCAN: &str = "span, li, a, div.pvs-header__optional-link";

pub(crate) struct ListRule {
    pub items: &'static [&'static str],
    pub primary: &'static [&'static str],
    pub secondary: &'static [&'static str],
}

pub(crate) const EXPERIENCE: ListRule = ListRule {
    items: &[
        "#experience ~ .pvs-list__outer-container li.artdeco-list__item",
        ".experience-section li",
    ],
    primary: &[".t-bold span", "h3"],
    secondary: &[".t-14.t-normal span", ".pv-entity__secondary-title"],
};

pub(crate) const EDUCATION: ListRule = ListRule {
    items: &[
        "#education ~ .pvs-list__outer-container li.artdeco-list__item",
        ".education-section li",
    ],
    primary: &[".t-bold span", "h3"],
    secondary: &[".t-14.t-normal span", ".pv-entity__degree-name"],
};

pub(crate) const SKILLS: &[&str] = &[
    "#skills ~ .pvs-list__outer-container .t-bold span[aria-hidden=true]",
    ".pv-skill-category-entity__name-text",
];

const GENERIC_TITLES: &[&str] = &["linkedin", "sign in", "join linkedin", "log in", "sign up"];

fn char_len_between(value: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&value.chars().count())
}

pub(crate) fn plausible_name(value: &str) -> bool {
    char_len_between(value, 1, 100)
        && !GENERIC_TITLES
            .iter()
            .any(|title| value.eq_ignore_ascii_case(title))
}

pub(crate) fn plausible_bio_line(value: &str) -> bool {
    char_len_between(value, 2, 300)
}

/// Locations never carry digits, bullets, or count keywords; those are the
/// neighbouring "500+ connections" and "· Contact info" spans.
pub(crate) fn plausible_location(value: &str) -> bool {
    let lower = value.to_lowercase();
    char_len_between(value, 3, 100)
        && !value.contains(['·', '•'])
        && !value.chars().any(|c| c.is_ascii_digit())
        && !lower.contains("connection")
        && !lower.contains("follower")
}

pub(crate) fn plausible_about(value: &str) -> bool {
    char_len_between(value, 10, 5000)
}

pub(crate) fn plausible_picture(value: &str) -> bool {
    value.starts_with("http")
}

pub(crate) fn plausible_industry(value: &str) -> bool {
    char_len_between(value, 2, 100)
}
