use super::*;

const FULL_PROFILE: &str = r#"
<html><head><title>Jane Doe | LinkedIn</title></head>
<body><main>
  <section class="pv-top-card">
    <div class="pv-top-card__photo">
      <img class="pv-top-card-profile-picture__image" src="https://media.licdn.com/jane.jpg">
    </div>
    <div class="pv-text-details__left-panel">
      <h1 class="text-heading-xlarge">  Jane   Doe </h1>
      <div class="text-body-medium break-words">Staff Engineer at Acme</div>
      <span class="text-body-small inline t-black--light break-words">Berlin, Germany</span>
      <span class="text-body-small inline t-black--light break-words">· Contact info</span>
    </div>
    <ul class="pv-top-card--list-bullet">
      <li><span class="t-bold">500+</span> connections</li>
      <li><span>12,345 followers</span></li>
      <li><a href="/mutual">7 mutual connections</a></li>
    </ul>
  </section>
  <section>
    <div id="about"></div>
    <div class="display-flex"><div class="inline-show-more-text">
      <span aria-hidden="true">I build distributed systems and mentor engineers.</span>
    </div></div>
  </section>
  <section>
    <div id="experience"></div>
    <div class="pvs-list__outer-container"><ul>
      <li class="artdeco-list__item">
        <div class="t-bold"><span>Staff Engineer</span></div>
        <span class="t-14 t-normal"><span>Acme Corp · Full-time</span></span>
      </li>
      <li class="artdeco-list__item">
        <div class="t-bold"><span>Senior Engineer</span></div>
        <span class="t-14 t-normal"><span>Globex</span></span>
      </li>
    </ul></div>
  </section>
  <section>
    <div id="education"></div>
    <div class="pvs-list__outer-container"><ul>
      <li class="artdeco-list__item">
        <div class="t-bold"><span>TU Berlin</span></div>
        <span class="t-14 t-normal"><span>MSc Computer Science</span></span>
      </li>
    </ul></div>
  </section>
  <section>
    <div id="skills"></div>
    <div class="pvs-list__outer-container">
      <div class="t-bold"><span aria-hidden="true">Rust</span></div>
      <div class="t-bold"><span aria-hidden="true">rust</span></div>
      <div class="t-bold"><span aria-hidden="true">PostgreSQL</span></div>
    </div>
  </section>
</main></body></html>
"#;

#[test]
fn extracts_full_profile() {
    let record = extract_profile(FULL_PROFILE, "https://linkedin.com/in/jane-doe/?trk=x");

    assert_eq!(record.name, "Jane Doe");
    assert_eq!(record.url, "https://linkedin.com/in/jane-doe");
    assert_eq!(record.bio_line.as_deref(), Some("Staff Engineer at Acme"));
    assert_eq!(record.headline, record.bio_line);
    assert_eq!(record.location.as_deref(), Some("Berlin, Germany"));
    assert_eq!(
        record.about.as_deref(),
        Some("I build distributed systems and mentor engineers.")
    );
    assert_eq!(
        record.profile_picture.as_deref(),
        Some("https://media.licdn.com/jane.jpg")
    );
    assert_eq!(record.connection_count, 500);
    assert_eq!(record.follower_count, 12_345);
    assert_eq!(record.experience.len(), 2);
    assert_eq!(record.experience[0].title, "Staff Engineer");
    assert_eq!(record.experience[0].company.as_deref(), Some("Acme Corp"));
    assert_eq!(record.education[0].school, "TU Berlin");
    assert_eq!(
        record.education[0].degree.as_deref(),
        Some("MSc Computer Science")
    );
    assert_eq!(record.skills, vec!["Rust".to_string(), "PostgreSQL".to_string()]);
    assert_eq!(record.extraction_status, ExtractionStatus::Success);
    assert!(record.extraction_errors.is_none());
    assert!(record.extracted_at.is_some());
}

#[test]
fn missing_name_is_failed_with_message() {
    let html = r#"<html><body><div class="text-body-medium break-words">Engineer</div></body></html>"#;
    let record = extract_profile(html, "https://linkedin.com/in/ghost");

    assert_eq!(record.extraction_status, ExtractionStatus::Failed);
    assert_eq!(record.extraction_errors.as_deref(), Some(NO_NAME_MESSAGE));
    assert_eq!(record.url, "https://linkedin.com/in/ghost");
}

#[test]
fn name_only_is_partial() {
    let html = "<html><body><main><h1>Solo Name</h1></main></body></html>";
    let record = extract_profile(html, "https://linkedin.com/in/solo");

    assert_eq!(record.name, "Solo Name");
    assert_eq!(record.extraction_status, ExtractionStatus::Partial);
}

#[test]
fn generic_page_title_is_not_a_name() {
    let html = "<html><body><h1>Sign in</h1></body></html>";
    let record = extract_profile(html, "https://linkedin.com/in/wall");
    assert_eq!(record.extraction_status, ExtractionStatus::Failed);
}

#[test]
fn implausible_connection_count_resets_to_zero() {
    let html = r#"<html><body><h1>Big Net</h1>
        <ul><li>250,000 connections</li><li>500,000 followers</li></ul>
        </body></html>"#;
    let record = extract_profile(html, "https://linkedin.com/in/big");

    assert_eq!(record.connection_count, 0);
    assert_eq!(record.follower_count, 500_000);
}

#[test]
fn location_skips_bullet_and_count_candidates() {
    let html = r#"<html><body><h1>Loc Test</h1>
        <ul class="pv-top-card--list-bullet">
          <li>500+ connections</li>
          <li>Toronto, Ontario, Canada</li>
        </ul></body></html>"#;
    let record = extract_profile(html, "https://linkedin.com/in/loc");
    assert_eq!(record.location.as_deref(), Some("Toronto, Ontario, Canada"));
    assert_eq!(record.extraction_status, ExtractionStatus::Success);
}

#[test]
fn experience_is_capped() {
    let items: String = (0..8)
        .map(|i| format!(r#"<li><h3>Role {i}</h3></li>"#))
        .collect();
    let html = format!(
        r#"<html><body><h1>Busy</h1><section class="experience-section"><ul>{items}</ul></section></body></html>"#
    );
    let record = extract_profile(&html, "https://linkedin.com/in/busy");
    assert_eq!(record.experience.len(), MAX_EXPERIENCE);
    assert_eq!(record.experience[0].title, "Role 0");
}

#[test]
fn skills_are_deduplicated_and_capped() {
    let spans: String = (0..40)
        .map(|i| {
            format!(
                r#"<span class="pv-skill-category-entity__name-text">Skill {}</span>"#,
                i % 20
            )
        })
        .collect();
    let html = format!("<html><body><h1>Skilled</h1>{spans}</body></html>");
    let record = extract_profile(&html, "https://linkedin.com/in/skilled");
    assert_eq!(record.skills.len(), MAX_SKILLS);
    assert_eq!(record.skills[0], "Skill 0");
}

#[test]
fn non_profile_url_is_kept_verbatim() {
    let record = extract_profile("<h1>Someone</h1>", " https://example.com/page ");
    assert_eq!(record.url, "https://example.com/page");
}

#[test]
fn empty_document_does_not_panic() {
    let record = extract_profile("", "https://linkedin.com/in/empty");
    assert_eq!(record.extraction_status, ExtractionStatus::Failed);
}
