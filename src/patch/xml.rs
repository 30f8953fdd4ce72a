// SPDX-FileCopyrightText: 2026 dpekbd developers
// SPDX-License-Identifier: MIT

//! Variant patching of the XML rules registry.
//!
//! The rules file (`evdev.xml`) is a registry of `layout` elements, each
//! carrying a `configItem` with its identity and a `variantList` with its
//! registered variants. Installing the layout means appending one `variant`
//! element to the variant list of the base layout, bracketed by marker
//! comment nodes so it can be found and removed later.
//!
//! The document is processed as a quick-xml event stream. Untouched events
//! are copied through verbatim, which keeps every node outside the marker
//! span byte-identical instead of subjecting the whole registry to a
//! parse/re-serialize round trip. Mutation decisions are made on the parsed
//! stream only; raw substring probes are never used to decide one, so a
//! marker-looking string inside unrelated text cannot confuse the patcher.
//!
//! # Marker Scoping
//!
//! Whether the patch is applied is judged inside the target layout's own
//! variant list. A marker comment that some other tool left elsewhere in the
//! document is reported as a lint warning and otherwise ignored.

use crate::patch::{BlockMarkers, TargetLayout, VariantRecord};

use quick_xml::{
    events::{BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};
use tracing::warn;

/// Insert or remove one marker-delimited `variant` element.
#[derive(Clone, Debug)]
pub struct XmlVariantPatcher {
    markers: BlockMarkers,
    target: TargetLayout,
}

impl XmlVariantPatcher {
    /// Construct new XML variant patcher.
    pub fn new(markers: BlockMarkers, target: TargetLayout) -> Self {
        Self { markers, target }
    }

    /// Check whether the variant block is present in the target layout's
    /// variant list.
    ///
    /// A layout that cannot be located counts as not applied.
    ///
    /// # Errors
    ///
    /// - Return [`Error::Parse`] if the document is malformed.
    pub fn is_applied(&self, document: &str) -> Result<bool> {
        let scan = self.scan(document)?;

        Ok(self
            .target_index(&scan)
            .map(|index| scan.layouts[index].begin_marker)
            .unwrap_or(false))
    }

    /// Append the marker-delimited variant to the target layout's variant
    /// list.
    ///
    /// Inserts, at the end of the variant list, a begin-marker comment, a
    /// `variant` element populated from `variant`, and an end-marker
    /// comment. An empty-element `<variantList/>` is expanded to hold them.
    /// Every other node is emitted byte-identical.
    ///
    /// # Errors
    ///
    /// - Return [`Error::TargetLayoutNotFound`] if no layout matches the
    ///   target identity.
    /// - Return [`Error::AlreadyApplied`] if the begin marker is already in
    ///   the target variant list. The variant is never inserted twice.
    /// - Return [`Error::NoVariantList`] if the matched layout has no
    ///   variant list.
    /// - Return [`Error::Parse`] if the document is malformed.
    ///
    /// None of these mutate anything: on error the caller's document is the
    /// only copy there is.
    pub fn apply(&self, document: &str, variant: &VariantRecord) -> Result<String> {
        let scan = self.scan(document)?;
        let target = self
            .target_index(&scan)
            .ok_or_else(|| Error::TargetLayoutNotFound {
                name: self.target.name.clone(),
                short_description: self.target.short_description.clone(),
            })?;

        if scan.layouts[target].begin_marker {
            return Err(Error::AlreadyApplied);
        }
        if scan.begin_anywhere {
            warn!(
                "marker comment {:?} found outside the target variant list; ignoring it",
                self.markers.begin
            );
        }
        if !scan.layouts[target].has_variant_list {
            return Err(Error::NoVariantList {
                name: self.target.name.clone(),
            });
        }

        self.insert_block(document, target, variant)
    }

    /// Remove the marker-delimited variant from the document.
    ///
    /// Drops the contiguous run of sibling nodes from the begin-marker
    /// comment through the matching end-marker comment, both inclusive,
    /// wherever in the registry that span lives. Siblings before and after
    /// the span are left untouched.
    ///
    /// # Errors
    ///
    /// - Return [`Error::NotApplied`] if no variant list contains a
    ///   begin-marker comment.
    /// - Return [`Error::CorruptBlock`] if a begin marker has no matching
    ///   end marker in the same variant list; nothing is removed.
    /// - Return [`Error::Parse`] if the document is malformed.
    pub fn revert(&self, document: &str) -> Result<String> {
        let scan = self.scan(document)?;
        let patched = scan
            .layouts
            .iter()
            .position(|layout| layout.begin_marker)
            .ok_or(Error::NotApplied)?;

        if !scan.layouts[patched].end_marker {
            return Err(Error::CorruptBlock);
        }

        self.remove_block(document, patched)
    }

    /// Locate the target layout in a scanned document.
    fn target_index(&self, scan: &DocumentScan) -> Option<usize> {
        scan.layouts
            .iter()
            .position(|layout| layout.matches(&self.target))
    }

    /// Collect per-layout facts in one read-only pass.
    fn scan(&self, document: &str) -> Result<DocumentScan> {
        let mut reader = Reader::from_str(document);
        let mut scan = DocumentScan::default();
        let mut stack: Vec<String> = Vec::new();
        let mut current: Option<usize> = None;

        loop {
            match reader.read_event()? {
                Event::Start(event) => {
                    let name = start_name(&event);
                    if name == "layout" {
                        scan.layouts.push(LayoutScan::default());
                        current = Some(scan.layouts.len() - 1);
                    } else if name == "variantList" && parent_is(&stack, "layout") {
                        if let Some(index) = current {
                            scan.layouts[index].has_variant_list = true;
                        }
                    }
                    stack.push(name);
                }
                Event::Empty(event) => {
                    if start_name(&event) == "variantList" && parent_is(&stack, "layout") {
                        if let Some(index) = current {
                            scan.layouts[index].has_variant_list = true;
                        }
                    }
                }
                Event::End(event) => {
                    if end_name(&event) == "layout" {
                        current = None;
                    }
                    stack.pop();
                }
                Event::Text(event) => {
                    if let Some(index) = current {
                        let layout = &mut scan.layouts[index];
                        let text = || String::from_utf8_lossy(event.as_ref()).trim().to_owned();
                        if path_is(&stack, &["layout", "configItem", "name"]) {
                            layout.name.get_or_insert_with(text);
                        } else if path_is(&stack, &["layout", "configItem", "shortDescription"]) {
                            layout.short_description.get_or_insert_with(text);
                        }
                    }
                }
                Event::Comment(event) => {
                    let text = String::from_utf8_lossy(event.as_ref()).into_owned();
                    if text.contains(self.markers.begin.as_str()) {
                        scan.begin_anywhere = true;
                    }
                    if let Some(index) = current {
                        if path_is(&stack, &["layout", "variantList"]) {
                            let layout = &mut scan.layouts[index];
                            if text.contains(self.markers.begin.as_str()) {
                                layout.begin_marker = true;
                            } else if text.contains(self.markers.end.as_str())
                                && layout.begin_marker
                            {
                                layout.end_marker = true;
                            }
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(scan)
    }

    /// Rewrite the document with the block appended to the target layout's
    /// variant list.
    fn insert_block(
        &self,
        document: &str,
        target: usize,
        variant: &VariantRecord,
    ) -> Result<String> {
        let mut reader = Reader::from_str(document);
        let mut writer = Writer::new(Vec::new());
        let mut stack: Vec<String> = Vec::new();
        let mut layout_count = 0;
        let mut current: Option<usize> = None;

        loop {
            let event = reader.read_event()?;
            match &event {
                Event::Start(start) => {
                    let name = start_name(start);
                    if name == "layout" {
                        current = Some(layout_count);
                        layout_count += 1;
                    }
                    stack.push(name);
                }
                Event::End(end) => {
                    let name = end_name(end);
                    if name == "variantList"
                        && current == Some(target)
                        && path_is(&stack, &["layout", "variantList"])
                    {
                        self.write_block(&mut writer, variant)?;
                    }
                    if name == "layout" {
                        current = None;
                    }
                    stack.pop();
                }
                Event::Empty(empty) => {
                    if start_name(empty) == "variantList"
                        && current == Some(target)
                        && parent_is(&stack, "layout")
                    {
                        let start = empty.clone();
                        writer.write_event(Event::Start(start.clone()))?;
                        self.write_block(&mut writer, variant)?;
                        writer.write_event(Event::End(start.to_end()))?;
                        continue;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            writer.write_event(event)?;
        }

        Ok(String::from_utf8(writer.into_inner())?)
    }

    /// Rewrite the document with the marker span of layout `patched` dropped.
    fn remove_block(&self, document: &str, patched: usize) -> Result<String> {
        let mut reader = Reader::from_str(document);
        let mut writer = Writer::new(Vec::new());
        let mut stack: Vec<String> = Vec::new();
        let mut layout_count = 0;
        let mut current: Option<usize> = None;
        let mut skipping = false;

        loop {
            let event = reader.read_event()?;
            match &event {
                Event::Start(start) => {
                    let name = start_name(start);
                    if name == "layout" {
                        current = Some(layout_count);
                        layout_count += 1;
                    }
                    stack.push(name);
                }
                Event::End(end) => {
                    if end_name(end) == "layout" {
                        current = None;
                    }
                    stack.pop();
                }
                Event::Comment(comment) => {
                    if current == Some(patched) && path_is(&stack, &["layout", "variantList"]) {
                        let text = String::from_utf8_lossy(comment.as_ref());
                        if !skipping && text.contains(self.markers.begin.as_str()) {
                            skipping = true;
                            continue;
                        }
                        if skipping && text.contains(self.markers.end.as_str()) {
                            skipping = false;
                            continue;
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            if !skipping {
                writer.write_event(event)?;
            }
        }

        Ok(String::from_utf8(writer.into_inner())?)
    }

    /// Emit begin comment, variant element, and end comment.
    ///
    /// Newline text nodes go only between the markers, so removing the
    /// inclusive marker span is the exact inverse of this insertion.
    fn write_block(&self, writer: &mut Writer<Vec<u8>>, variant: &VariantRecord) -> Result<()> {
        writer.write_event(Event::Comment(BytesText::from_escaped(format!(
            " {} ",
            self.markers.begin
        ))))?;
        writer.write_event(Event::Text(BytesText::new("\n")))?;
        writer.write_event(Event::Start(BytesStart::new("variant")))?;
        writer.write_event(Event::Start(BytesStart::new("configItem")))?;
        writer.write_event(Event::Start(BytesStart::new("name")))?;
        writer.write_event(Event::Text(BytesText::new(variant.name.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new("name")))?;
        writer.write_event(Event::Start(BytesStart::new("description")))?;
        writer.write_event(Event::Text(BytesText::new(variant.description.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new("description")))?;
        writer.write_event(Event::End(BytesEnd::new("configItem")))?;
        writer.write_event(Event::End(BytesEnd::new("variant")))?;
        writer.write_event(Event::Text(BytesText::new("\n")))?;
        writer.write_event(Event::Comment(BytesText::from_escaped(format!(
            " {} ",
            self.markers.end
        ))))?;

        Ok(())
    }
}

impl Default for XmlVariantPatcher {
    fn default() -> Self {
        Self::new(BlockMarkers::rules(), TargetLayout::default())
    }
}

/// Facts collected about one `layout` element.
#[derive(Debug, Default)]
struct LayoutScan {
    name: Option<String>,
    short_description: Option<String>,
    has_variant_list: bool,
    begin_marker: bool,
    end_marker: bool,
}

impl LayoutScan {
    fn matches(&self, target: &TargetLayout) -> bool {
        self.name.as_deref() == Some(target.name.as_str())
            && self.short_description.as_deref() == Some(target.short_description.as_str())
    }
}

/// Facts collected about the whole document.
#[derive(Debug, Default)]
struct DocumentScan {
    layouts: Vec<LayoutScan>,
    begin_anywhere: bool,
}

fn start_name(event: &BytesStart) -> String {
    String::from_utf8_lossy(event.name().local_name().as_ref()).into_owned()
}

fn end_name(event: &BytesEnd) -> String {
    String::from_utf8_lossy(event.name().local_name().as_ref()).into_owned()
}

/// Check the innermost open element.
fn parent_is(stack: &[String], name: &str) -> bool {
    stack.last().map(String::as_str) == Some(name)
}

/// Check the innermost open elements against a path suffix.
fn path_is(stack: &[String], suffix: &[&str]) -> bool {
    stack.len() >= suffix.len()
        && stack[stack.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(name, expect)| name == expect)
}

/// XML variant patching error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Begin marker already in the target variant list; the variant is
    /// never inserted twice.
    #[error("variant block markers already present in target variant list")]
    AlreadyApplied,

    /// No variant list contains a begin marker; there is nothing to remove.
    #[error("no variant block markers present")]
    NotApplied,

    /// Begin marker comment without a matching end marker comment.
    #[error("begin marker comment has no matching end marker comment")]
    CorruptBlock,

    /// No layout in the registry matches the target identity.
    #[error("no layout with name {name:?} and short description {short_description:?}")]
    TargetLayoutNotFound {
        name: String,
        short_description: String,
    },

    /// Matched layout carries no variant list to patch.
    #[error("layout {name:?} has no variant list")]
    NoVariantList { name: String },

    /// Rules document is not well-formed XML.
    #[error("malformed XML in rules document")]
    Parse(#[from] quick_xml::Error),

    /// Patched document could not be serialized.
    #[error("failed to serialize patched rules document")]
    Serialize(#[from] std::io::Error),

    /// Patched document is not valid UTF-8.
    #[error("patched rules document is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const RULES: &str = indoc! {r#"
        <?xml version="1.0" encoding="utf-8"?>
        <xkbConfigRegistry version="1.1">
          <layoutList>
            <layout>
              <configItem>
                <name>us</name>
                <shortDescription>en</shortDescription>
                <description>English (US)</description>
              </configItem>
              <variantList>
              </variantList>
            </layout>
            <layout>
              <configItem>
                <name>de</name>
                <shortDescription>de</shortDescription>
                <description>German</description>
              </configItem>
              <variantList>
                <variant>
                  <configItem>
                    <name>nodeadkeys</name>
                    <description>German (no dead keys)</description>
                  </configItem>
                </variant>
              </variantList>
            </layout>
          </layoutList>
        </xkbConfigRegistry>
    "#};

    const BLOCK: &str = "<!-- DPE-BEGIN -->\n\
        <variant><configItem>\
        <name>dpe</name>\
        <description>English (Programmer Dvorak Eur. Keys)</description>\
        </configItem></variant>\n\
        <!-- DPE-END -->";

    #[test]
    fn apply_appends_variant_to_target_list_only() -> anyhow::Result<()> {
        let patcher = XmlVariantPatcher::default();

        let result = patcher.apply(RULES, &VariantRecord::default())?;
        let expect = RULES.replacen("</variantList>", &format!("{BLOCK}</variantList>"), 1);
        assert_eq!(result, expect);
        assert!(patcher.is_applied(&result)?);

        Ok(())
    }

    #[test]
    fn apply_refuses_second_application() -> anyhow::Result<()> {
        let patcher = XmlVariantPatcher::default();

        let patched = patcher.apply(RULES, &VariantRecord::default())?;
        let result = patcher.apply(&patched, &VariantRecord::default());
        assert!(matches!(result, Err(Error::AlreadyApplied)));

        Ok(())
    }

    #[test]
    fn revert_restores_original_exactly() -> anyhow::Result<()> {
        let patcher = XmlVariantPatcher::default();

        let patched = patcher.apply(RULES, &VariantRecord::default())?;
        let result = patcher.revert(&patched)?;
        assert_eq!(result, RULES);
        assert!(!patcher.is_applied(&result)?);

        Ok(())
    }

    #[test]
    fn apply_expands_empty_element_variant_list() -> anyhow::Result<()> {
        let document = indoc! {r#"
            <xkbConfigRegistry>
              <layout>
                <configItem>
                  <name>us</name>
                  <shortDescription>en</shortDescription>
                </configItem>
                <variantList/>
              </layout>
            </xkbConfigRegistry>
        "#};
        let patcher = XmlVariantPatcher::default();

        let patched = patcher.apply(document, &VariantRecord::default())?;
        assert!(patched.contains("<variantList><!-- DPE-BEGIN -->"));
        assert!(patched.contains("<!-- DPE-END --></variantList>"));

        let reverted = patcher.revert(&patched)?;
        assert!(reverted.contains("<variantList></variantList>"));

        Ok(())
    }

    #[test]
    fn apply_matches_layout_on_short_description() -> anyhow::Result<()> {
        let document = indoc! {r#"
            <xkbConfigRegistry>
              <layout>
                <configItem>
                  <name>us</name>
                  <shortDescription>intl</shortDescription>
                </configItem>
                <variantList>
                  <variant><configItem><name>decoy</name></configItem></variant>
                </variantList>
              </layout>
              <layout>
                <configItem>
                  <name>us</name>
                  <shortDescription>en</shortDescription>
                </configItem>
                <variantList>
                </variantList>
              </layout>
            </xkbConfigRegistry>
        "#};
        let patcher = XmlVariantPatcher::default();

        let patched = patcher.apply(document, &VariantRecord::default())?;
        let marker = patched.find("DPE-BEGIN").unwrap();
        let decoy = patched.find("decoy").unwrap();
        assert!(marker > decoy, "variant must land in the second us layout");

        Ok(())
    }

    #[test]
    fn apply_ignores_marker_outside_target_list() -> anyhow::Result<()> {
        // First <variant> in the fixture sits in the de layout's list.
        let document = RULES.replacen(
            "<variant>",
            "<!-- DPE-BEGIN --><!-- DPE-END --><variant>",
            1,
        );
        let patcher = XmlVariantPatcher::default();

        assert!(!patcher.is_applied(&document)?);
        let patched = patcher.apply(&document, &VariantRecord::default())?;
        assert!(patcher.is_applied(&patched)?);

        Ok(())
    }

    #[test]
    fn apply_fails_without_target_layout() {
        let document = indoc! {r#"
            <xkbConfigRegistry>
              <layout>
                <configItem>
                  <name>de</name>
                  <shortDescription>de</shortDescription>
                </configItem>
                <variantList></variantList>
              </layout>
            </xkbConfigRegistry>
        "#};
        let patcher = XmlVariantPatcher::default();

        let result = patcher.apply(document, &VariantRecord::default());
        assert!(matches!(result, Err(Error::TargetLayoutNotFound { .. })));
    }

    #[test]
    fn apply_fails_without_variant_list() {
        let document = indoc! {r#"
            <xkbConfigRegistry>
              <layout>
                <configItem>
                  <name>us</name>
                  <shortDescription>en</shortDescription>
                </configItem>
              </layout>
            </xkbConfigRegistry>
        "#};
        let patcher = XmlVariantPatcher::default();

        let result = patcher.apply(document, &VariantRecord::default());
        assert!(matches!(result, Err(Error::NoVariantList { .. })));
    }

    #[test]
    fn revert_without_markers_is_refused() {
        let patcher = XmlVariantPatcher::default();

        let result = patcher.revert(RULES);
        assert!(matches!(result, Err(Error::NotApplied)));
    }

    #[test]
    fn revert_detects_missing_end_marker() {
        let document = RULES.replacen(
            "</variantList>",
            "<!-- DPE-BEGIN --><variant><configItem><name>dpe</name></configItem></variant></variantList>",
            1,
        );
        let patcher = XmlVariantPatcher::default();

        let result = patcher.revert(&document);
        assert!(matches!(result, Err(Error::CorruptBlock)));
    }
}
