//! Tag and attribute vocabulary used to recognize names without allocating.
//!
//! Tags are classified by a `DispatchTable` over their first two bytes and,
//! when a slot is shared, resolved through a `FastMap`. Each tag carries an
//! attribute hint table keyed by the attribute's first byte; anything the
//! hint does not settle goes to the global attribute `FastMap`.
//!
//! A vocabulary is assembled with `VocabularyBuilder` and frozen by
//! `build()`. The frozen value has no mutation API and is shared between
//! scanners through `Arc`.

use crate::dispatch::{DispatchError, DispatchId, DispatchSlot, DispatchTable, MAX_NAME_LEN};
use crate::fast_map::{FastMap, FastMapError, MAX_KEYS};
use std::fmt;
use std::num::NonZeroU16;
use std::sync::{Arc, OnceLock};

pub type TagId = DispatchId;

/// Identity of a registered attribute name. Never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrId(NonZeroU16);

impl AttrId {
    pub fn get(self) -> u16 {
        self.0.get()
    }

    fn from_index(index: usize) -> Option<Self> {
        let raw = u16::try_from(index.checked_add(1)?).ok()?;
        NonZeroU16::new(raw).map(Self)
    }

    fn index(self) -> usize {
        usize::from(self.0.get()) - 1
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VocabularyError {
    Tag(DispatchError),
    Attribute(FastMapError),
}

impl fmt::Display for VocabularyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VocabularyError::Tag(err) => write!(f, "tag registration failed: {err}"),
            VocabularyError::Attribute(err) => write!(f, "attribute registration failed: {err}"),
        }
    }
}

impl std::error::Error for VocabularyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VocabularyError::Tag(err) => Some(err),
            VocabularyError::Attribute(err) => Some(err),
        }
    }
}

impl From<DispatchError> for VocabularyError {
    fn from(err: DispatchError) -> Self {
        VocabularyError::Tag(err)
    }
}

impl From<FastMapError> for VocabularyError {
    fn from(err: FastMapError) -> Self {
        VocabularyError::Attribute(err)
    }
}

/// First-byte attribute hints of one tag (ASCII only).
struct AttrHints {
    by_first: [Option<AttrId>; 128],
}

impl AttrHints {
    fn new() -> Self {
        Self {
            by_first: [None; 128],
        }
    }

    fn get(&self, first: u8) -> Option<AttrId> {
        self.by_first
            .get(usize::from(first.to_ascii_lowercase()))
            .copied()
            .flatten()
    }

    /// First attribute registered for a given first byte keeps the hint.
    fn offer(&mut self, first: u8, id: AttrId) {
        if let Some(slot) = self.by_first.get_mut(usize::from(first.to_ascii_lowercase()))
            && slot.is_none()
        {
            *slot = Some(id);
        }
    }
}

pub struct VocabularyBuilder {
    tags: DispatchTable,
    tag_names: Vec<Arc<str>>,
    tag_map: FastMap<TagId>,
    tag_attrs: Vec<AttrHints>,
    attr_names: Vec<Arc<str>>,
    attr_map: FastMap<AttrId>,
}

impl VocabularyBuilder {
    pub fn new() -> Self {
        Self {
            tags: DispatchTable::new(),
            tag_names: Vec::new(),
            tag_map: FastMap::new(),
            tag_attrs: Vec::new(),
            attr_names: Vec::new(),
            attr_map: FastMap::new(),
        }
    }

    /// Register a tag and the attributes expected on it.
    ///
    /// Names are trimmed and lower-cased. Empty attribute names are skipped.
    /// Register the most common tags first: when two tags share their first
    /// two bytes both stay recognizable, but only through the slower exact
    /// lookup.
    pub fn add_tag(&mut self, name: &str, attrs: &[&str]) -> Result<TagId, VocabularyError> {
        let name = name.trim();
        if self.attr_map.len().saturating_add(attrs.len()) > MAX_KEYS {
            return Err(VocabularyError::Attribute(FastMapError::Full { max: MAX_KEYS }));
        }
        let registration = self.tags.register(name)?;
        let id = registration.id;
        let canonical: Arc<str> = Arc::from(name.to_ascii_lowercase());
        self.tag_map.add(&canonical, id)?;
        self.tag_names.push(Arc::clone(&canonical));

        let mut hints = AttrHints::new();
        for attr in attrs {
            let attr = attr.trim().to_ascii_lowercase();
            let Some(&first) = attr.as_bytes().first() else {
                continue;
            };
            let attr_id = match self.attr_map.get(&attr) {
                Some(&existing) => existing,
                None => {
                    let attr_id = AttrId::from_index(self.attr_names.len())
                        .ok_or(FastMapError::Full { max: MAX_KEYS })?;
                    self.attr_map.add(&attr, attr_id)?;
                    self.attr_names.push(Arc::from(attr.as_str()));
                    attr_id
                }
            };
            hints.offer(first, attr_id);
        }
        self.tag_attrs.push(hints);

        log::debug!(
            target: "fasthtml.vocabulary",
            "registered tag {canonical:?} as {} with {} attributes (fast slot: {})",
            id.get(),
            attrs.len(),
            registration.claimed
        );
        Ok(id)
    }

    pub fn build(self) -> Arc<Vocabulary> {
        log::debug!(
            target: "fasthtml.vocabulary",
            "vocabulary built: {} tags, {} attributes",
            self.tag_names.len(),
            self.attr_names.len()
        );
        Arc::new(Vocabulary {
            tags: self.tags,
            tag_names: self.tag_names,
            tag_map: self.tag_map,
            tag_attrs: self.tag_attrs,
            attr_names: self.attr_names,
            attr_map: self.attr_map,
        })
    }
}

impl Default for VocabularyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Frozen tag/attribute vocabulary.
pub struct Vocabulary {
    tags: DispatchTable,
    tag_names: Vec<Arc<str>>,
    tag_map: FastMap<TagId>,
    tag_attrs: Vec<AttrHints>,
    attr_names: Vec<Arc<str>>,
    attr_map: FastMap<AttrId>,
}

impl Vocabulary {
    pub fn builder() -> VocabularyBuilder {
        VocabularyBuilder::new()
    }

    /// Vocabulary that recognizes nothing; every name takes the generic path.
    pub fn empty() -> Arc<Vocabulary> {
        VocabularyBuilder::new().build()
    }

    /// Shared default vocabulary of common HTML tags and attributes.
    pub fn html() -> Arc<Vocabulary> {
        static HTML: OnceLock<Arc<Vocabulary>> = OnceLock::new();
        Arc::clone(HTML.get_or_init(build_html))
    }

    /// Classify a tag name given as raw source bytes (any ASCII case).
    #[inline]
    pub fn match_tag(&self, name: &[u8]) -> Option<TagId> {
        let (&b1, rest) = name.split_first()?;
        let b2 = rest.first().copied().unwrap_or(b'>');
        match self.tags.lookup(b1, b2) {
            DispatchSlot::Absent => None,
            DispatchSlot::Found(id) => self
                .tag_name(id)
                .filter(|canonical| canonical.as_bytes().eq_ignore_ascii_case(name))
                .map(|_| id),
            DispatchSlot::Ambiguous => {
                let mut folded = [0u8; MAX_NAME_LEN];
                let key = fold_into(&mut folded, name)?;
                self.tag_map.get(key).copied()
            }
        }
    }

    /// Canonical `Arc<str>` of a tag name, if it is part of the vocabulary.
    pub fn canonical_tag(&self, name: &str) -> Option<&Arc<str>> {
        self.match_tag(name.as_bytes())
            .and_then(|id| self.tag_name(id))
    }

    pub fn tag_name(&self, id: TagId) -> Option<&Arc<str>> {
        self.tag_names.get(id.index())
    }

    /// Classify an attribute name within the namespace of `tag`, falling back
    /// to the global attribute table.
    pub fn match_attr(&self, tag: Option<TagId>, name: &[u8]) -> Option<AttrId> {
        let (&first, _) = name.split_first()?;
        if let Some(hints) = tag.and_then(|id| self.tag_attrs.get(id.index()))
            && let Some(id) = hints.get(first)
            && self.attr_matches(id, name)
        {
            return Some(id);
        }
        let second = name.get(1).copied().unwrap_or(0);
        if let Some(&id) = self
            .attr_map
            .get_likely_present(first.to_ascii_lowercase(), second.to_ascii_lowercase())
            && self.attr_matches(id, name)
        {
            return Some(id);
        }
        let mut folded = [0u8; MAX_NAME_LEN];
        let key = fold_into(&mut folded, name)?;
        self.attr_map.get(key).copied()
    }

    pub fn attr_name(&self, id: AttrId) -> Option<&Arc<str>> {
        self.attr_names.get(id.index())
    }

    pub fn tag_count(&self) -> usize {
        self.tag_names.len()
    }

    pub fn attr_count(&self) -> usize {
        self.attr_names.len()
    }

    fn attr_matches(&self, id: AttrId, name: &[u8]) -> bool {
        self.attr_name(id)
            .is_some_and(|canonical| canonical.as_bytes().eq_ignore_ascii_case(name))
    }
}

impl fmt::Debug for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vocabulary")
            .field("tags", &self.tag_names.len())
            .field("attributes", &self.attr_names.len())
            .finish()
    }
}

/// Lower-case `name` into `buf`. `None` when it does not fit or is not UTF-8.
fn fold_into<'a>(buf: &'a mut [u8; MAX_NAME_LEN], name: &[u8]) -> Option<&'a str> {
    let out = buf.get_mut(..name.len())?;
    for (dst, src) in out.iter_mut().zip(name) {
        *dst = src.to_ascii_lowercase();
    }
    std::str::from_utf8(out).ok()
}

const GLOBAL_ATTRS: &[&str] = &["class", "id", "style", "title", "lang", "dir"];

/// Tags in rough order of frequency in real pages, with their typical attributes.
const HTML_TAGS: &[(&str, &[&str])] = &[
    ("a", &["href", "target", "rel", "name"]),
    ("div", &[]),
    ("span", &[]),
    ("p", &["align"]),
    ("br", &["clear"]),
    ("img", &["src", "alt", "width", "height", "border"]),
    ("li", &["value"]),
    ("td", &["colspan", "rowspan", "width", "height", "align", "valign", "nowrap"]),
    ("tr", &["align", "valign", "bgcolor"]),
    ("table", &["border", "cellpadding", "cellspacing", "width", "bgcolor", "align"]),
    ("ul", &["type"]),
    ("ol", &["type", "start"]),
    ("b", &[]),
    ("i", &[]),
    ("u", &[]),
    ("strong", &[]),
    ("em", &[]),
    ("font", &["face", "size", "color"]),
    ("input", &["type", "name", "value", "checked", "size", "maxlength", "placeholder"]),
    ("form", &["action", "method", "name", "enctype"]),
    ("option", &["value", "selected"]),
    ("select", &["name", "size", "multiple"]),
    ("textarea", &["name", "rows", "cols"]),
    ("button", &["type", "name", "value", "disabled"]),
    ("label", &["for"]),
    ("meta", &["name", "content", "charset", "http-equiv"]),
    ("link", &["rel", "href", "type", "media"]),
    ("script", &["src", "type", "async", "defer", "language"]),
    ("style", &["type", "media"]),
    ("html", &[]),
    ("head", &[]),
    ("title", &[]),
    ("body", &["bgcolor", "background", "onload"]),
    ("h1", &[]),
    ("h2", &[]),
    ("h3", &[]),
    ("h4", &[]),
    ("h5", &[]),
    ("h6", &[]),
    ("hr", &["size", "width", "noshade"]),
    ("th", &["colspan", "rowspan", "width", "align", "scope"]),
    ("thead", &[]),
    ("tbody", &[]),
    ("tfoot", &[]),
    ("iframe", &["src", "width", "height", "frameborder", "name"]),
    ("frame", &["src", "name"]),
    ("noscript", &[]),
    ("center", &[]),
    ("small", &[]),
    ("big", &[]),
    ("pre", &[]),
    ("code", &[]),
    ("blockquote", &["cite"]),
    ("dl", &[]),
    ("dt", &[]),
    ("dd", &[]),
    ("nav", &[]),
    ("header", &[]),
    ("footer", &[]),
    ("section", &[]),
    ("article", &[]),
    ("aside", &[]),
    ("main", &[]),
    ("base", &["href", "target"]),
    ("area", &["href", "shape", "coords", "alt"]),
    ("map", &["name"]),
    ("object", &["data", "type", "width", "height"]),
    ("param", &["name", "value"]),
    ("embed", &["src", "type", "width", "height"]),
    ("video", &["src", "poster", "controls", "autoplay"]),
    ("audio", &["src", "controls", "autoplay"]),
    ("source", &["src", "type", "srcset"]),
    ("canvas", &["width", "height"]),
    ("svg", &["width", "height", "viewbox"]),
    ("sup", &[]),
    ("sub", &[]),
    ("abbr", &[]),
    ("caption", &[]),
    ("fieldset", &[]),
    ("legend", &[]),
    ("s", &[]),
];

fn build_html() -> Arc<Vocabulary> {
    let mut builder = VocabularyBuilder::new();
    for (tag, attrs) in HTML_TAGS {
        let attrs: Vec<&str> = attrs.iter().chain(GLOBAL_ATTRS).copied().collect();
        if let Err(err) = builder.add_tag(tag, &attrs) {
            log::warn!(target: "fasthtml.vocabulary", "skipping default tag {tag:?}: {err}");
        }
    }
    builder.build()
}
