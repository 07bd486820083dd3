//! Extraction of structured content from arXiv's LaTeXML HTML.
//!
//! arXiv renders papers to HTML with [LaTeXML](https://math.nist.gov/~BMiller/LaTeXML/),
//! which marks every structural element with an `ltx_`-prefixed class:
//! `ltx_title_document`, `ltx_section`, `ltx_figure`, `ltx_bibliography`, and
//! so on. This module walks the parsed DOM and lifts those markers into the
//! [`Paper`] model, preserving document order throughout: sections appear in
//! reading order, and figures and equations land at the position where the
//! document places them.
//!
//! Math elements carry their original LaTeX source in `alttext`; each one is
//! handed to the [`MathRenderer`] as it is encountered, so a rendering
//! failure degrades that one span and nothing else.
//!
//! A document with no `ltx_` class at all is not a LaTeXML rendering and is
//! rejected with [`OffprintError::Parse`] rather than silently producing an
//! empty paper.

use std::{collections::HashMap, rc::Rc};

use html5ever::{parse_document, tendril::TendrilSink};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

use super::*;
use crate::{
  fetch::FetchedPaper,
  math::MathRenderer,
  paper::{Block, Figure, Inline, MathSpan, Paper, Reference, Section},
};

lazy_static! {
  /// Runs of whitespace, collapsed to a single space.
  static ref WS: Regex = Regex::new(r"\s+").unwrap();
}

/// Parses one fetched HTML document into a [`Paper`].
///
/// Math spans are rendered through `renderer` as they are encountered.
///
/// # Errors
///
/// [`OffprintError::Parse`] when the document carries no LaTeXML markup.
pub fn parse_paper(fetched: &FetchedPaper, renderer: &MathRenderer) -> Result<Paper> {
  let dom = parse_document(RcDom::default(), Default::default())
    .from_utf8()
    .read_from(&mut fetched.html.as_bytes())?;
  let root = dom.document;

  if !has_latexml_markup(&root) {
    return Err(OffprintError::Parse(format!(
      "no LaTeXML markup found in document for {}",
      fetched.id
    )));
  }

  let meta = collect_meta(&root);

  let title = find_class(&root, "ltx_title_document")
    .map(|node| squeeze(&text_content(&node)))
    .filter(|t| !t.is_empty())
    .or_else(|| meta.get("citation_title").and_then(|v| v.first().cloned()))
    .unwrap_or_else(|| "Untitled".to_string());

  let mut authors: Vec<String> = Vec::new();
  collect_class(&root, "ltx_personname", &mut |node| {
    let name = squeeze(&text_content(node));
    if !name.is_empty() && !authors.contains(&name) {
      authors.push(name);
    }
  });
  if authors.is_empty() {
    if let Some(values) = meta.get("citation_author") {
      authors = values.clone();
    }
  }

  let abstract_text = find_class(&root, "ltx_abstract")
    .map(|node| abstract_body(&node))
    .filter(|t| !t.is_empty())
    .or_else(|| meta.get("description").and_then(|v| v.first().cloned()))
    .unwrap_or_default();

  let date = meta
    .get("citation_date")
    .and_then(|v| v.first().cloned())
    .or_else(|| {
      find_class(&root, "ltx_date").map(|node| squeeze(&text_content(&node)))
    })
    .filter(|d| !d.is_empty());

  let content_root = find_class(&root, "ltx_page_main")
    .or_else(|| find_tag(&root, "article"))
    .or_else(|| find_tag(&root, "main"))
    .or_else(|| find_tag(&root, "body"))
    .unwrap_or_else(|| root.clone());

  let mut builder = PaperBuilder {
    base_url:   &fetched.base_url,
    renderer,
    sections:   Vec::new(),
    figures:    Vec::new(),
    references: Vec::new(),
    math:       Vec::new(),
  };
  builder.walk(&content_root);

  let paper = Paper {
    id: fetched.id.clone(),
    title,
    authors,
    abstract_text,
    date,
    sections: builder.sections,
    figures: builder.figures,
    references: builder.references,
    math: builder.math,
  };
  paper.check_references()?;
  Ok(paper)
}

/// Document-order accumulator for sections, figures, references, and math.
struct PaperBuilder<'a> {
  /// Base URL for resolving relative image links.
  base_url:   &'a Url,
  /// Renderer applied to each math span as it is found.
  renderer:   &'a MathRenderer,
  /// Sections in reading order; blocks append to the last one.
  sections:   Vec<Section>,
  /// Figures in reading order.
  figures:    Vec<Figure>,
  /// Bibliography entries in reading order.
  references: Vec<Reference>,
  /// Math spans in reading order.
  math:       Vec<MathSpan>,
}

/// Classes that open a new section, with their nesting level.
const SECTION_CLASSES: &[(&str, u8)] = &[
  ("ltx_section", 1),
  ("ltx_appendix", 1),
  ("ltx_subsection", 2),
  ("ltx_subsubsection", 3),
  ("ltx_paragraph", 3),
];

/// Front-matter classes excluded from the content walk; they are extracted
/// separately and would otherwise duplicate as body text.
const SKIP_CLASSES: &[&str] =
  &["ltx_title_document", "ltx_authors", "ltx_abstract", "ltx_date", "ltx_keywords"];

impl PaperBuilder<'_> {
  /// Recursive descent over the content subtree.
  fn walk(&mut self, node: &Handle) {
    let NodeData::Element { ref name, .. } = node.data else {
      for child in node.children.borrow().iter() {
        self.walk(child);
      }
      return;
    };

    let tag = name.local.as_ref();
    if matches!(tag, "nav" | "header" | "footer" | "script" | "style") {
      return;
    }

    let classes = class_list(node);
    if SKIP_CLASSES.iter().any(|skip| classes.iter().any(|c| c == skip)) {
      return;
    }

    if classes.iter().any(|c| c == "ltx_bibliography") {
      self.collect_bibliography(node);
      return;
    }

    if let Some(&(_, level)) =
      SECTION_CLASSES.iter().find(|(class, _)| classes.iter().any(|c| c == class))
    {
      self.open_section(node, level);
      for child in node.children.borrow().iter() {
        self.walk(child);
      }
      return;
    }

    if tag == "figure" || classes.iter().any(|c| c == "ltx_figure") {
      self.collect_figure(node);
      return;
    }

    if classes.iter().any(|c| c == "ltx_equation" || c == "ltx_equationgroup") {
      self.collect_paragraph(node, true);
      return;
    }

    if tag == "p" || classes.iter().any(|c| c == "ltx_p") {
      self.collect_paragraph(node, false);
      return;
    }

    for child in node.children.borrow().iter() {
      self.walk(child);
    }
  }

  /// Starts a new section from its wrapper element.
  fn open_section(&mut self, node: &Handle, level: u8) {
    let id = attr(node, "id").unwrap_or_else(|| format!("S{}", self.sections.len() + 1));
    let title = find_class_prefix(node, "ltx_title")
      .map(|heading| squeeze(&text_content(&heading)))
      .unwrap_or_default();
    self.sections.push(Section { id, title, level, blocks: Vec::new() });
  }

  /// The section current content appends to, created on demand for documents
  /// whose body never opens one.
  fn current_section(&mut self) -> &mut Section {
    if self.sections.is_empty() {
      self.sections.push(Section {
        id:     "content".to_string(),
        title:  "Content".to_string(),
        level:  1,
        blocks: Vec::new(),
      });
    }
    self.sections.last_mut().unwrap()
  }

  /// Converts a paragraph-like element into inline runs.
  fn collect_paragraph(&mut self, node: &Handle, display: bool) {
    let mut inlines = Vec::new();
    self.collect_inlines(node, &mut inlines, display);

    // merge adjacent text runs and squeeze whitespace
    let mut merged: Vec<Inline> = Vec::new();
    for inline in inlines {
      match (merged.last_mut(), inline) {
        (Some(Inline::Text(tail)), Inline::Text(text)) => tail.push_str(&text),
        (_, inline) => merged.push(inline),
      }
    }
    for inline in &mut merged {
      if let Inline::Text(text) = inline {
        *text = squeeze(text);
      }
    }
    merged.retain(|inline| !matches!(inline, Inline::Text(text) if text.is_empty()));

    if !merged.is_empty() {
      self.current_section().blocks.push(Block::Paragraph(merged));
    }
  }

  /// Flattens a paragraph subtree into text and math runs.
  fn collect_inlines(&mut self, node: &Handle, out: &mut Vec<Inline>, display: bool) {
    for child in node.children.borrow().iter() {
      match child.data {
        NodeData::Text { ref contents } => {
          out.push(Inline::Text(contents.borrow().to_string()));
        },
        NodeData::Element { ref name, .. } if name.local.as_ref() == "math" => {
          let latex = attr(child, "alttext")
            .map(|alt| alt.trim().to_string())
            .filter(|alt| !alt.is_empty())
            .unwrap_or_else(|| squeeze(&text_content(child)));
          if latex.is_empty() {
            continue;
          }
          let display = display || attr(child, "display").as_deref() == Some("block");
          let rendering = self.renderer.render(&latex);
          self.math.push(MathSpan { latex, display, rendering });
          out.push(Inline::Math(self.math.len() - 1));
        },
        NodeData::Element { .. } => self.collect_inlines(child, out, display),
        _ => {},
      }
    }
  }

  /// Records a figure and places it in the current section.
  fn collect_figure(&mut self, node: &Handle) {
    let id = attr(node, "id").unwrap_or_else(|| format!("F{}", self.figures.len() + 1));

    let url = find_tag(node, "img")
      .and_then(|img| attr(&img, "src"))
      .and_then(|src| match self.base_url.join(&src) {
        Ok(resolved) => Some(resolved),
        Err(err) => {
          warn!("ignoring unresolvable image link {src:?}: {err}");
          None
        },
      });

    let caption = find_class(node, "ltx_caption")
      .or_else(|| find_tag(node, "figcaption"))
      .map(|cap| squeeze(&text_content(&cap)))
      .unwrap_or_default();

    self.figures.push(Figure { id, caption, url, image: None });
    let index = self.figures.len() - 1;
    self.current_section().blocks.push(Block::Figure(index));
  }

  /// Reads the bibliography list into flat reference entries.
  fn collect_bibliography(&mut self, node: &Handle) {
    collect_class(node, "ltx_bibitem", &mut |item| {
      let text = squeeze(&text_content(item));
      if !text.is_empty() {
        self.references.push(Reference { text });
      }
    });
    if self.references.is_empty() {
      // some renderings use plain list items without the bibitem class
      visit_tag(node, "li", &mut |item| {
        let text = squeeze(&text_content(item));
        if !text.is_empty() {
          self.references.push(Reference { text });
        }
      });
    }
  }
}

/// Collapses whitespace runs and trims.
fn squeeze(text: &str) -> String {
  WS.replace_all(text.trim(), " ").to_string()
}

/// Reads an element attribute by local name.
fn attr(node: &Handle, name: &str) -> Option<String> {
  let NodeData::Element { ref attrs, .. } = node.data else {
    return None;
  };
  attrs
    .borrow()
    .iter()
    .find(|a| a.name.local.as_ref() == name)
    .map(|a| a.value.to_string())
}

/// The element's class attribute, split into tokens.
fn class_list(node: &Handle) -> Vec<String> {
  attr(node, "class")
    .map(|classes| classes.split_whitespace().map(str::to_string).collect())
    .unwrap_or_default()
}

/// Whether any element in the subtree carries an `ltx_`-prefixed class.
fn has_latexml_markup(node: &Handle) -> bool {
  if class_list(node).iter().any(|c| c.starts_with("ltx_")) {
    return true;
  }
  node.children.borrow().iter().any(has_latexml_markup)
}

/// First element in document order carrying the given class.
fn find_class(node: &Handle, class: &str) -> Option<Handle> {
  find_first(node, &|n| class_list(n).iter().any(|c| c == class))
}

/// First element whose class starts with the given prefix.
fn find_class_prefix(node: &Handle, prefix: &str) -> Option<Handle> {
  find_first(node, &|n| class_list(n).iter().any(|c| c.starts_with(prefix)))
}

/// First element in document order with the given tag.
fn find_tag(node: &Handle, tag: &str) -> Option<Handle> {
  find_first(node, &|n| {
    matches!(n.data, NodeData::Element { ref name, .. } if name.local.as_ref() == tag)
  })
}

/// Depth-first search for the first matching element.
fn find_first(node: &Handle, pred: &dyn Fn(&Handle) -> bool) -> Option<Handle> {
  for child in node.children.borrow().iter() {
    if pred(child) {
      return Some(child.clone());
    }
    if let Some(found) = find_first(child, pred) {
      return Some(found);
    }
  }
  None
}

/// Visits every element in the subtree carrying the given class.
fn collect_class(node: &Handle, class: &str, visit: &mut dyn FnMut(&Handle)) {
  for child in node.children.borrow().iter() {
    if class_list(child).iter().any(|c| c == class) {
      visit(child);
    } else {
      collect_class(child, class, visit);
    }
  }
}

/// Visits every element in the subtree with the given tag.
fn visit_tag(node: &Handle, tag: &str, visit: &mut dyn FnMut(&Handle)) {
  for child in node.children.borrow().iter() {
    if matches!(child.data, NodeData::Element { ref name, .. } if name.local.as_ref() == tag) {
      visit(child);
    } else {
      visit_tag(child, tag, visit);
    }
  }
}

/// Concatenated text of the subtree, unnormalized.
fn text_content(node: &Handle) -> String {
  let mut out = String::new();
  append_text(node, &mut out);
  out
}

/// Recursive worker for [`text_content`].
fn append_text(node: &Rc<Node>, out: &mut String) {
  for child in node.children.borrow().iter() {
    match child.data {
      NodeData::Text { ref contents } => out.push_str(&contents.borrow()),
      _ => append_text(child, out),
    }
  }
}

/// Abstract body text, excluding the "Abstract" heading itself.
fn abstract_body(node: &Handle) -> String {
  let mut parts = Vec::new();
  collect_class(node, "ltx_p", &mut |p| {
    let text = squeeze(&text_content(p));
    if !text.is_empty() {
      parts.push(text);
    }
  });
  if parts.is_empty() {
    squeeze(&text_content(node))
  } else {
    parts.join(" ")
  }
}

/// All `<meta name=... content=...>` pairs in the document head.
fn collect_meta(node: &Handle) -> HashMap<String, Vec<String>> {
  let mut meta: HashMap<String, Vec<String>> = HashMap::new();
  visit_tag(node, "meta", &mut |tag| {
    if let (Some(name), Some(content)) = (attr(tag, "name"), attr(tag, "content")) {
      let content = squeeze(&content);
      if !content.is_empty() {
        meta.entry(name).or_default().push(content);
      }
    }
  });
  meta
}
