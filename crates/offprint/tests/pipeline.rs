//! End-to-end pipeline tests over a fixture document: parse, degrade, and
//! compose without touching the network.

use offprint::{
  compose::{compose_pdf, fonts, PageGeometry, RenderOptions},
  fetch::FetchedPaper,
  math::MathRenderer,
  paper::{Block, Inline, MathRendering},
  parse::parse_paper,
};
use url::Url;

const FIXTURE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta name="citation_date" content="2024/02/14"/>
</head>
<body>
<div class="ltx_page_main">
  <h1 class="ltx_title ltx_title_document">Pipelines, End to End</h1>
  <div class="ltx_authors"><span class="ltx_personname">Grace Hopper</span></div>
  <div class="ltx_abstract">
    <h6 class="ltx_title">Abstract</h6>
    <p class="ltx_p">We run the whole thing at once.</p>
  </div>
  <section class="ltx_section" id="S1">
    <h2 class="ltx_title ltx_title_section">Setup</h2>
    <p class="ltx_p">For any <math alttext="\epsilon &gt; 0" display="inline"><mi>x</mi></math>
      the following holds.</p>
    <table class="ltx_equation">
      <tr><td><math alttext="\sum_{i=1}^{n} x_i \leq n" display="block"><mi>s</mi></math></td></tr>
    </table>
    <p class="ltx_p">Here is one the renderer cannot typeset:
      <math alttext="\undefinedmacro{\brokenthing}{}{" display="inline"><mi>y</mi></math>.</p>
  </section>
  <section class="ltx_section" id="S2">
    <h2 class="ltx_title ltx_title_section">Results</h2>
    <figure class="ltx_figure" id="F1">
      <img src="plots/x1.png"/>
      <figcaption class="ltx_caption">Results over time.</figcaption>
    </figure>
    <p class="ltx_p">Discussion of the figure.</p>
  </section>
  <section class="ltx_bibliography" id="bib">
    <ul class="ltx_biblist">
      <li class="ltx_bibitem">C. Prior. Foundational result. 2018.</li>
    </ul>
  </section>
</div>
</body>
</html>"#;

fn fixture_paper() -> offprint::paper::Paper {
  let fetched = FetchedPaper {
    id:       "2402.08954".to_string(),
    html:     FIXTURE.to_string(),
    base_url: Url::parse("https://arxiv.org/html/2402.08954v1/").unwrap(),
  };
  parse_paper(&fetched, &MathRenderer::new(96)).unwrap()
}

#[test]
fn document_order_is_preserved_across_sections() {
  let paper = fixture_paper();

  assert_eq!(paper.title, "Pipelines, End to End");
  assert_eq!(paper.sections.len(), 2);
  assert_eq!(paper.sections[0].title, "Setup");
  assert_eq!(paper.sections[1].title, "Results");

  // figure precedes the discussion paragraph, as in the source
  let results = &paper.sections[1];
  assert!(matches!(results.blocks[0], Block::Figure(0)));
  assert!(matches!(results.blocks[1], Block::Paragraph(_)));

  assert_eq!(paper.references.len(), 1);
  assert!(paper.check_references().is_ok());
}

#[test]
fn every_math_span_has_a_rendering() {
  let paper = fixture_paper();
  assert_eq!(paper.math.len(), 3);

  // display flag comes from the element's display attribute
  assert!(!paper.math[0].display);
  assert!(paper.math[1].display);

  // the malformed span degraded to text instead of failing the parse
  for span in &paper.math {
    match &span.rendering {
      MathRendering::Image(image) => assert!(!image.png.is_empty()),
      MathRendering::Text(text) => assert!(!text.is_empty()),
    }
  }
}

#[test]
fn text_only_renderer_degrades_every_span() {
  let fetched = FetchedPaper {
    id:       "2402.08954".to_string(),
    html:     FIXTURE.to_string(),
    base_url: Url::parse("https://arxiv.org/html/2402.08954v1/").unwrap(),
  };
  let paper = parse_paper(&fetched, &MathRenderer::text_only()).unwrap();

  assert_eq!(paper.math.len(), 3);
  for span in &paper.math {
    let MathRendering::Text(text) = &span.rendering else {
      panic!("text-only renderer produced an image for {:?}", span.latex);
    };
    assert!(!text.is_empty());
  }
}

#[test]
fn figure_url_resolves_against_base() {
  let paper = fixture_paper();
  assert_eq!(
    paper.figures[0].url.as_ref().unwrap().as_str(),
    "https://arxiv.org/html/2402.08954v1/plots/x1.png"
  );
  assert_eq!(paper.figures[0].caption, "Results over time.");
}

#[test]
fn inline_math_sits_inside_its_paragraph() {
  let paper = fixture_paper();
  let Block::Paragraph(inlines) = &paper.sections[0].blocks[0] else {
    panic!("expected a paragraph");
  };
  assert!(inlines.iter().any(|i| matches!(i, Inline::Math(0))));
  assert!(inlines.iter().any(|i| matches!(i, Inline::Text(t) if t.contains("following holds"))));
}

#[test]
fn composes_without_hydrated_figures() {
  if !fonts::default_fonts_available() {
    return;
  }
  // figure images were never downloaded; captions must carry the document
  let paper = fixture_paper();
  let options = RenderOptions { geometry: PageGeometry::default(), include_images: true };
  let bytes = compose_pdf(&paper, &options).unwrap();
  assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn composes_with_images_disabled() {
  if !fonts::default_fonts_available() {
    return;
  }
  let paper = fixture_paper();
  let options = RenderOptions { geometry: PageGeometry::custom(158.0, 210.0), include_images: false };
  let bytes = compose_pdf(&paper, &options).unwrap();
  assert!(bytes.starts_with(b"%PDF"));
}
