//! Accessibility annotation for game pages.
//!
//! A one-time sweep over the page fills in what game markup usually omits:
//! - Accessible names for buttons and images
//! - Focus styling for interactive controls
//! - Keyboard reachability for the canvas and game-area containers
//! - A keyboard-shortcut help overlay toggled by `F1`
//!
//! The annotator also owns a visually hidden live region for screen-reader
//! announcements and follows the forced-colors media query.

use crate::config::{AccessibilityConfig, DEFAULT_GAME_NAME};
use crate::platform::{Document, KeyboardEvents, MediaQueries, TimerScheduler};
use crate::result::VigiaResult;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Elements treated as buttons
pub const BUTTON_SELECTOR: &str =
    r#"button, [role="button"], input[type="button"], input[type="submit"]"#;

/// The game canvas and its conventional containers
pub const GAME_AREA_SELECTOR: &str = "canvas, .game-area, #game-container, [data-game-area]";

/// Fallback name for an unlabelled button
pub const DEFAULT_BUTTON_LABEL: &str = "Interactive button";

/// Fallback `alt` for an image
pub const DEFAULT_IMAGE_ALT: &str = "Game image";

/// Class applied to annotated buttons
pub const FOCUS_CLASS: &str = "vigia-focusable";

/// Marker class on the injected focus stylesheet
pub const FOCUS_STYLE_MARKER: &str = "vigia-focus-style";

/// Class toggled on `<html>` while forced colors are active
pub const HIGH_CONTRAST_CLASS: &str = "vigia-high-contrast";

/// `id` of the help overlay
pub const HELP_OVERLAY_ID: &str = "vigia-help";

/// `id` of the announcement live region
pub const LIVE_REGION_ID: &str = "vigia-announcer";

const HIGH_CONTRAST_STYLE_ID: &str = "vigia-high-contrast-style";

const SR_ONLY_STYLE: &str = "position:absolute;left:-10000px;width:1px;height:1px;overflow:hidden;";

const FOCUS_CSS: &str = ".vigia-focusable:focus-visible, canvas:focus-visible, \
[data-game-area]:focus-visible { outline: 3px solid #ffbf47; outline-offset: 2px; }";

const HIGH_CONTRAST_CSS: &str = ".vigia-high-contrast, .vigia-high-contrast * \
{ background: #000 !important; color: #fff !important; border-color: #fff !important; }";

/// Shortcuts listed in the help overlay
pub const KEYBOARD_SHORTCUTS: &[(&str, &str)] = &[
    ("F1", "Show or hide this help"),
    ("Tab", "Move between controls"),
    ("Enter / Space", "Activate the focused control"),
    ("Arrow keys", "Move within the game area"),
    ("Escape", "Pause or close dialogs"),
];

/// `aria-live` politeness
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncePriority {
    /// Read when the user is idle
    #[default]
    Polite,
    /// Interrupt the current utterance
    Assertive,
}

impl AnnouncePriority {
    /// Attribute value
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Polite => "polite",
            Self::Assertive => "assertive",
        }
    }
}

impl fmt::Display for AnnouncePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one sweep changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationSummary {
    /// Buttons that received an `aria-label`
    pub buttons_labelled: usize,
    /// Images that received an `alt`
    pub images_labelled: usize,
    /// Canvas or game-area elements that received any attribute
    pub regions_annotated: usize,
    /// Whether forced colors were active during the sweep
    pub high_contrast: bool,
}

/// First non-blank candidate, trimmed, or `default`
#[must_use]
pub fn fallback_label<I>(candidates: I, default: &str) -> String
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
        .unwrap_or_else(|| default.to_string())
}

struct AnnotatorState<E> {
    game_name: String,
    config: AccessibilityConfig,
    initialized: bool,
    summary: Option<AnnotationSummary>,
    help_overlay: Option<E>,
    help_visible: bool,
    live_region: Option<E>,
    high_contrast: bool,
    contrast_style: Option<E>,
}

/// Annotates one page and announces to assistive technology
pub struct AccessibilityAnnotator<P: Document> {
    page: Rc<P>,
    state: Rc<RefCell<AnnotatorState<P::Element>>>,
}

impl<P: Document> Clone for AccessibilityAnnotator<P> {
    fn clone(&self) -> Self {
        Self {
            page: Rc::clone(&self.page),
            state: Rc::clone(&self.state),
        }
    }
}

impl<P: Document> fmt::Debug for AccessibilityAnnotator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("AccessibilityAnnotator")
            .field("game_name", &state.game_name)
            .field("summary", &state.summary)
            .field("help_visible", &state.help_visible)
            .field("high_contrast", &state.high_contrast)
            .finish_non_exhaustive()
    }
}

impl<P> AccessibilityAnnotator<P>
where
    P: Document + KeyboardEvents + MediaQueries + TimerScheduler + 'static,
{
    /// Create an annotator for `page`
    #[must_use]
    pub fn new(page: Rc<P>) -> Self {
        Self {
            page,
            state: Rc::new(RefCell::new(AnnotatorState {
                game_name: DEFAULT_GAME_NAME.to_string(),
                config: AccessibilityConfig::default(),
                initialized: false,
                summary: None,
                help_overlay: None,
                help_visible: false,
                live_region: None,
                high_contrast: false,
                contrast_style: None,
            })),
        }
    }

    /// Set the name used for game-area labels
    #[must_use]
    pub fn with_game_name(self, name: impl Into<String>) -> Self {
        self.state.borrow_mut().game_name = name.into();
        self
    }

    /// Replace the settings
    #[must_use]
    pub fn with_config(self, config: AccessibilityConfig) -> Self {
        self.state.borrow_mut().config = config;
        self
    }

    /// Sweep the page once
    ///
    /// Later calls change nothing and return the first sweep's summary, or
    /// an empty one if that sweep failed part way. A page without media
    /// query support is swept without forced-colors tracking.
    pub fn init(&self) -> VigiaResult<AnnotationSummary> {
        let game_name = {
            let mut state = self.state.borrow_mut();
            if state.initialized {
                return Ok(state.summary.clone().unwrap_or_default());
            }
            state.initialized = true;
            state.game_name.clone()
        };
        let page = &*self.page;

        inject_focus_style(page)?;
        let buttons_labelled = label_buttons(page)?;
        let images_labelled = label_images(page)?;
        let regions_annotated = annotate_game_areas(page, &game_name)?;
        self.install_help_overlay()?;
        let high_contrast = self.watch_high_contrast().unwrap_or_else(|error| {
            tracing::warn!(%error, "forced-colors tracking unavailable");
            false
        });

        let summary = AnnotationSummary {
            buttons_labelled,
            images_labelled,
            regions_annotated,
            high_contrast,
        };
        tracing::info!(
            game = %game_name,
            buttons = buttons_labelled,
            images = images_labelled,
            regions = regions_annotated,
            high_contrast,
            "accessibility annotations applied"
        );
        self.state.borrow_mut().summary = Some(summary.clone());
        Ok(summary)
    }

    /// Whether `init` has run
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.borrow().initialized
    }

    /// Speak `message` through the live region
    ///
    /// The text is cleared after the configured delay even if a newer
    /// message replaced it in the meantime.
    pub fn announce_to_screen_reader(
        &self,
        message: &str,
        priority: AnnouncePriority,
    ) -> VigiaResult<()> {
        let region = self.live_region()?;
        let page = &*self.page;
        page.set_attribute(&region, "aria-live", priority.as_str())?;
        page.set_text_content(&region, message);
        tracing::debug!(%priority, message, "announcement");

        let delay = self.state.borrow().config.announcement_clear_ms;
        let weak_page = Rc::downgrade(&self.page);
        page.set_timeout(
            delay,
            Box::new(move || {
                if let Some(page) = weak_page.upgrade() {
                    page.set_text_content(&region, "");
                }
            }),
        )?;
        Ok(())
    }

    /// The live region, created on first use
    fn live_region(&self) -> VigiaResult<P::Element> {
        if let Some(region) = self.state.borrow().live_region.clone() {
            return Ok(region);
        }
        let page = &*self.page;
        let region = page.create_element("div")?;
        page.set_attribute(&region, "id", LIVE_REGION_ID)?;
        page.set_attribute(&region, "aria-live", AnnouncePriority::Polite.as_str())?;
        page.set_attribute(&region, "aria-atomic", "true")?;
        page.set_attribute(&region, "style", SR_ONLY_STYLE)?;
        page.append_to_body(&region)?;
        self.state.borrow_mut().live_region = Some(region.clone());
        Ok(region)
    }

    /// Whether forced colors are active
    #[must_use]
    pub fn is_high_contrast(&self) -> bool {
        self.state.borrow().high_contrast
    }

    /// Whether the help overlay is showing
    #[must_use]
    pub fn is_help_visible(&self) -> bool {
        self.state.borrow().help_visible
    }

    /// Show or hide the help overlay; returns the new visibility
    pub fn toggle_help(&self) -> VigiaResult<bool> {
        toggle_help(&*self.page, &self.state)
    }

    fn install_help_overlay(&self) -> VigiaResult<()> {
        let page = &*self.page;
        let overlay = page.create_element("div")?;
        page.set_attribute(&overlay, "id", HELP_OVERLAY_ID)?;
        page.set_attribute(&overlay, "role", "dialog")?;
        page.set_attribute(&overlay, "aria-label", "Keyboard shortcuts")?;
        page.set_attribute(&overlay, "hidden", "")?;
        page.set_attribute(&overlay, "aria-hidden", "true")?;

        let heading = page.create_element("h2")?;
        page.set_text_content(&heading, "Keyboard shortcuts");
        page.append_child(&overlay, &heading)?;

        let list = page.create_element("ul")?;
        for (key, action) in KEYBOARD_SHORTCUTS {
            let item = page.create_element("li")?;
            page.set_text_content(&item, &format!("{key}: {action}"));
            page.append_child(&list, &item)?;
        }
        page.append_child(&overlay, &list)?;
        page.append_to_body(&overlay)?;

        let help_key = {
            let mut state = self.state.borrow_mut();
            state.help_overlay = Some(overlay);
            state.help_visible = false;
            state.config.help_key.clone()
        };

        let weak_page = Rc::downgrade(&self.page);
        let weak_state = Rc::downgrade(&self.state);
        page.on_key_down(Box::new(move |key: &str| {
            if key != help_key {
                return false;
            }
            let (Some(page), Some(state)) = (weak_page.upgrade(), weak_state.upgrade()) else {
                return false;
            };
            if let Err(error) = toggle_help(&*page, &state) {
                tracing::warn!(%error, "help overlay toggle failed");
            }
            true
        }));
        Ok(())
    }

    fn watch_high_contrast(&self) -> VigiaResult<bool> {
        let query = self.state.borrow().config.high_contrast_query.clone();
        let weak_page: Weak<P> = Rc::downgrade(&self.page);
        let weak_state = Rc::downgrade(&self.state);
        let initial = self.page.watch_media(
            &query,
            Box::new(move |matches| {
                let (Some(page), Some(state)) = (weak_page.upgrade(), weak_state.upgrade()) else {
                    return;
                };
                if let Err(error) = apply_high_contrast(&*page, &state, matches) {
                    tracing::warn!(%error, "high contrast update failed");
                }
            }),
        )?;
        apply_high_contrast(&*self.page, &self.state, initial)?;
        Ok(initial)
    }
}

fn inject_focus_style<P: Document>(page: &P) -> VigiaResult<()> {
    if !page.query_all(&format!(".{FOCUS_STYLE_MARKER}"))?.is_empty() {
        return Ok(());
    }
    let style = page.create_element("style")?;
    page.add_class(&style, FOCUS_STYLE_MARKER)?;
    page.set_text_content(&style, FOCUS_CSS);
    page.append_to_head(&style)
}

fn non_blank_attribute<P: Document>(
    page: &P,
    element: &P::Element,
    name: &str,
) -> Option<String> {
    page.attribute(element, name).filter(|value| !value.trim().is_empty())
}

fn label_buttons<P: Document>(page: &P) -> VigiaResult<usize> {
    let mut labelled = 0;
    for button in page.query_all(BUTTON_SELECTOR)? {
        page.add_class(&button, FOCUS_CLASS)?;
        if non_blank_attribute(page, &button, "aria-label").is_some() {
            continue;
        }
        let visible_text = if page.tag_name(&button) == "input" {
            page.attribute(&button, "value")
        } else {
            Some(page.text_content(&button))
        };
        let label = fallback_label(
            [
                visible_text,
                page.attribute(&button, "title"),
                page.attribute(&button, "id"),
            ],
            DEFAULT_BUTTON_LABEL,
        );
        page.set_attribute(&button, "aria-label", &label)?;
        labelled += 1;
    }
    Ok(labelled)
}

fn label_images<P: Document>(page: &P) -> VigiaResult<usize> {
    let mut labelled = 0;
    for image in page.query_all("img")? {
        if page.attribute(&image, "alt").is_some() {
            continue;
        }
        let alt = fallback_label(
            [
                page.attribute(&image, "aria-label"),
                page.attribute(&image, "title"),
                page.attribute(&image, "id"),
            ],
            DEFAULT_IMAGE_ALT,
        );
        page.set_attribute(&image, "alt", &alt)?;
        labelled += 1;
    }
    Ok(labelled)
}

fn annotate_game_areas<P: Document>(page: &P, game_name: &str) -> VigiaResult<usize> {
    let default_label = format!("{game_name} game area");
    let mut annotated = 0;
    for area in page.query_all(GAME_AREA_SELECTOR)? {
        let mut changed = false;
        if page.attribute(&area, "tabindex").is_none() {
            page.set_attribute(&area, "tabindex", "0")?;
            changed = true;
        }
        if page.attribute(&area, "role").is_none() {
            page.set_attribute(&area, "role", "application")?;
            changed = true;
        }
        if non_blank_attribute(page, &area, "aria-label").is_none() {
            let label = fallback_label(
                [page.attribute(&area, "title"), page.attribute(&area, "id")],
                &default_label,
            );
            page.set_attribute(&area, "aria-label", &label)?;
            changed = true;
        }
        if changed {
            annotated += 1;
        }
    }
    Ok(annotated)
}

fn toggle_help<P: Document>(
    page: &P,
    state: &RefCell<AnnotatorState<P::Element>>,
) -> VigiaResult<bool> {
    let mut state = state.borrow_mut();
    let Some(overlay) = state.help_overlay.clone() else {
        return Ok(false);
    };
    let visible = !state.help_visible;
    if visible {
        page.remove_attribute(&overlay, "hidden")?;
        page.set_attribute(&overlay, "aria-hidden", "false")?;
    } else {
        page.set_attribute(&overlay, "hidden", "")?;
        page.set_attribute(&overlay, "aria-hidden", "true")?;
    }
    state.help_visible = visible;
    Ok(visible)
}

fn apply_high_contrast<P: Document>(
    page: &P,
    state: &RefCell<AnnotatorState<P::Element>>,
    active: bool,
) -> VigiaResult<()> {
    let mut state = state.borrow_mut();
    state.high_contrast = active;
    let root = page.root_element();

    if active {
        if let Some(root) = &root {
            page.add_class(root, HIGH_CONTRAST_CLASS)?;
        }
        if state.contrast_style.is_none() {
            let style = page.create_element("style")?;
            page.set_attribute(&style, "id", HIGH_CONTRAST_STYLE_ID)?;
            page.set_text_content(&style, HIGH_CONTRAST_CSS);
            page.append_to_head(&style)?;
            state.contrast_style = Some(style);
        }
    } else {
        if let Some(root) = &root {
            page.remove_class(root, HIGH_CONTRAST_CLASS)?;
        }
        if let Some(style) = state.contrast_style.take() {
            page.remove(&style);
        }
    }
    tracing::debug!(active, "high contrast mode");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockPage, NodeId};

    const FORCED_COLORS: &str = "(forced-colors: active)";

    fn annotated(page: &Rc<MockPage>) -> (AccessibilityAnnotator<MockPage>, AnnotationSummary) {
        let annotator = AccessibilityAnnotator::new(Rc::clone(page)).with_game_name("Snake");
        let summary = annotator.init().unwrap();
        (annotator, summary)
    }

    fn button(page: &MockPage, attributes: &[(&str, &str)], text: &str) -> NodeId {
        let dom = page.dom();
        dom.append_element(dom.body(), "button", attributes, text)
    }

    mod fallback_tests {
        use super::*;

        #[test]
        fn test_first_non_blank_wins() {
            let label = fallback_label(
                [None, Some("   ".to_string()), Some(" Start ".to_string())],
                "x",
            );
            assert_eq!(label, "Start");
        }

        #[test]
        fn test_default_when_all_missing() {
            assert_eq!(fallback_label([None, None], "Game image"), "Game image");
        }
    }

    mod button_tests {
        use super::*;

        #[test]
        fn test_label_priority() {
            let page = Rc::new(MockPage::new());
            let existing = button(&page, &[("aria-label", "Keep")], "Text");
            let text = button(&page, &[("title", "T")], "Play");
            let title = button(&page, &[("title", "Pause"), ("id", "p")], "");
            let id = button(&page, &[("id", "restart")], "  ");
            let bare = button(&page, &[], "");

            let (_annotator, summary) = annotated(&page);
            let dom = page.dom();
            assert_eq!(dom.attr(existing, "aria-label").as_deref(), Some("Keep"));
            assert_eq!(dom.attr(text, "aria-label").as_deref(), Some("Play"));
            assert_eq!(dom.attr(title, "aria-label").as_deref(), Some("Pause"));
            assert_eq!(dom.attr(id, "aria-label").as_deref(), Some("restart"));
            assert_eq!(
                dom.attr(bare, "aria-label").as_deref(),
                Some(DEFAULT_BUTTON_LABEL)
            );
            assert_eq!(summary.buttons_labelled, 4);
        }

        #[test]
        fn test_blank_aria_label_replaced() {
            let page = Rc::new(MockPage::new());
            let empty = button(&page, &[("aria-label", "")], "Play");
            let spaces = button(&page, &[("aria-label", "   "), ("title", "Quit")], "");

            let (_annotator, summary) = annotated(&page);
            let dom = page.dom();
            assert_eq!(dom.attr(empty, "aria-label").as_deref(), Some("Play"));
            assert_eq!(dom.attr(spaces, "aria-label").as_deref(), Some("Quit"));
            assert_eq!(summary.buttons_labelled, 2);
        }

        #[test]
        fn test_input_value_is_visible_text() {
            let page = Rc::new(MockPage::new());
            let dom = page.dom();
            let submit = dom.append_element(
                dom.body(),
                "input",
                &[("type", "submit"), ("value", "Send"), ("id", "send-btn")],
                "",
            );
            let blank = dom.append_element(
                dom.body(),
                "input",
                &[("type", "button"), ("value", " "), ("title", "Reset")],
                "",
            );

            let (_annotator, _) = annotated(&page);
            assert_eq!(dom.attr(submit, "aria-label").as_deref(), Some("Send"));
            assert_eq!(dom.attr(blank, "aria-label").as_deref(), Some("Reset"));
        }

        #[test]
        fn test_button_like_elements() {
            let page = Rc::new(MockPage::new());
            let dom = page.dom();
            let role = dom.append_element(dom.body(), "div", &[("role", "button")], "Go");
            let submit =
                dom.append_element(dom.body(), "input", &[("type", "submit"), ("id", "send")], "");
            let text_input = dom.append_element(dom.body(), "input", &[("type", "text")], "");

            let (_annotator, summary) = annotated(&page);
            assert_eq!(dom.attr(role, "aria-label").as_deref(), Some("Go"));
            assert_eq!(dom.attr(submit, "aria-label").as_deref(), Some("send"));
            assert!(dom.attr(text_input, "aria-label").is_none());
            assert!(dom.has_class(role, FOCUS_CLASS));
            assert_eq!(summary.buttons_labelled, 2);
        }

        #[test]
        fn test_focus_style_injected_once() {
            let page = Rc::new(MockPage::new());
            button(&page, &[], "A");
            let (_first, _) = annotated(&page);
            let (_second, _) = annotated(&page);
            let styles = page
                .dom()
                .query_all(&format!(".{FOCUS_STYLE_MARKER}"))
                .unwrap();
            assert_eq!(styles.len(), 1);
        }
    }

    mod image_tests {
        use super::*;

        #[test]
        fn test_alt_priority() {
            let page = Rc::new(MockPage::new());
            let dom = page.dom();
            let body = dom.body();
            let kept = dom.append_element(body, "img", &[("alt", "")], "");
            let aria = dom.append_element(body, "img", &[("aria-label", "Hero")], "");
            let title = dom.append_element(body, "img", &[("title", "Coin")], "");
            let bare = dom.append_element(body, "img", &[], "");

            let (_annotator, summary) = annotated(&page);
            assert_eq!(dom.attr(kept, "alt").as_deref(), Some(""));
            assert_eq!(dom.attr(aria, "alt").as_deref(), Some("Hero"));
            assert_eq!(dom.attr(title, "alt").as_deref(), Some("Coin"));
            assert_eq!(dom.attr(bare, "alt").as_deref(), Some(DEFAULT_IMAGE_ALT));
            assert_eq!(summary.images_labelled, 3);
        }
    }

    mod game_area_tests {
        use super::*;

        #[test]
        fn test_canvas_made_focusable() {
            let page = Rc::new(MockPage::new());
            let dom = page.dom();
            let canvas = dom.append_element(dom.body(), "canvas", &[], "");

            let (_annotator, summary) = annotated(&page);
            assert_eq!(dom.attr(canvas, "tabindex").as_deref(), Some("0"));
            assert_eq!(dom.attr(canvas, "role").as_deref(), Some("application"));
            assert_eq!(
                dom.attr(canvas, "aria-label").as_deref(),
                Some("Snake game area")
            );
            assert_eq!(summary.regions_annotated, 1);
        }

        #[test]
        fn test_existing_attributes_kept() {
            let page = Rc::new(MockPage::new());
            let dom = page.dom();
            let container = dom.append_element(
                dom.body(),
                "div",
                &[
                    ("id", "game-container"),
                    ("tabindex", "-1"),
                    ("role", "region"),
                    ("aria-label", "Board"),
                ],
                "",
            );
            let area = dom.append_element(dom.body(), "section", &[("class", "game-area")], "");
            let data = dom.append_element(dom.body(), "div", &[("data-game-area", "")], "");

            let (_annotator, summary) = annotated(&page);
            assert_eq!(dom.attr(container, "tabindex").as_deref(), Some("-1"));
            assert_eq!(dom.attr(container, "role").as_deref(), Some("region"));
            assert_eq!(dom.attr(area, "role").as_deref(), Some("application"));
            assert_eq!(dom.attr(data, "tabindex").as_deref(), Some("0"));
            assert_eq!(summary.regions_annotated, 2);
        }

        #[test]
        fn test_blank_area_label_replaced() {
            let page = Rc::new(MockPage::new());
            let dom = page.dom();
            let canvas = dom.append_element(
                dom.body(),
                "canvas",
                &[("aria-label", "  "), ("tabindex", "0"), ("role", "img")],
                "",
            );

            let (_annotator, summary) = annotated(&page);
            assert_eq!(
                dom.attr(canvas, "aria-label").as_deref(),
                Some("Snake game area")
            );
            assert_eq!(dom.attr(canvas, "role").as_deref(), Some("img"));
            assert_eq!(summary.regions_annotated, 1);
        }
    }

    mod help_tests {
        use super::*;

        #[test]
        fn test_overlay_hidden_then_toggled_by_f1() {
            let page = Rc::new(MockPage::new());
            let (annotator, _) = annotated(&page);
            let dom = page.dom();
            let overlay = dom.by_id(HELP_OVERLAY_ID).unwrap();
            assert!(dom.attr(overlay, "hidden").is_some());
            assert!(!annotator.is_help_visible());

            assert!(page.press_key("F1"));
            assert!(annotator.is_help_visible());
            assert!(dom.attr(overlay, "hidden").is_none());
            assert_eq!(dom.attr(overlay, "aria-hidden").as_deref(), Some("false"));

            assert!(!page.press_key("Enter"));
            assert!(annotator.is_help_visible());

            page.press_key("F1");
            assert!(!annotator.is_help_visible());
            assert!(dom.attr(overlay, "hidden").is_some());
        }

        #[test]
        fn test_overlay_lists_shortcuts() {
            let page = Rc::new(MockPage::new());
            let (_annotator, _) = annotated(&page);
            let dom = page.dom();
            assert_eq!(
                dom.query_all("li").unwrap().len(),
                KEYBOARD_SHORTCUTS.len()
            );
            let text = dom.text(dom.by_id(HELP_OVERLAY_ID).unwrap());
            assert!(text.contains("F1: Show or hide this help"));
        }

        #[test]
        fn test_toggle_help_directly() {
            let page = Rc::new(MockPage::new());
            let (annotator, _) = annotated(&page);
            assert!(annotator.toggle_help().unwrap());
            assert!(!annotator.toggle_help().unwrap());
        }

        #[test]
        fn test_toggle_before_init_is_noop() {
            let page = Rc::new(MockPage::new());
            let annotator = AccessibilityAnnotator::new(page);
            assert!(!annotator.toggle_help().unwrap());
        }
    }

    mod contrast_tests {
        use super::*;

        #[test]
        fn test_initial_match_applied() {
            let page = Rc::new(MockPage::new());
            page.set_media(FORCED_COLORS, true);
            let (annotator, summary) = annotated(&page);
            assert!(summary.high_contrast);
            assert!(annotator.is_high_contrast());
            let dom = page.dom();
            assert!(dom.has_class(dom.root(), HIGH_CONTRAST_CLASS));
            assert!(dom.by_id(HIGH_CONTRAST_STYLE_ID).is_some());
        }

        #[test]
        fn test_follows_media_changes() {
            let page = Rc::new(MockPage::new());
            let (annotator, summary) = annotated(&page);
            let dom = page.dom();
            assert!(!summary.high_contrast);
            assert!(!dom.has_class(dom.root(), HIGH_CONTRAST_CLASS));

            page.set_media(FORCED_COLORS, true);
            assert!(annotator.is_high_contrast());
            assert!(dom.has_class(dom.root(), HIGH_CONTRAST_CLASS));
            let style = dom.by_id(HIGH_CONTRAST_STYLE_ID).unwrap();

            page.set_media(FORCED_COLORS, false);
            assert!(!annotator.is_high_contrast());
            assert!(!dom.has_class(dom.root(), HIGH_CONTRAST_CLASS));
            assert!(!dom.is_attached(style));
        }

        #[test]
        fn test_missing_media_queries_not_fatal() {
            let page = Rc::new(MockPage::new());
            page.disable_media_queries();
            button(&page, &[], "Fire");

            let (annotator, summary) = annotated(&page);
            assert!(!summary.high_contrast);
            assert!(!annotator.is_high_contrast());
            assert_eq!(summary.buttons_labelled, 1);
            assert_eq!(page.media_listeners(FORCED_COLORS), 0);

            assert_eq!(annotator.init().unwrap(), summary);
            assert_eq!(page.dom().query_all("#vigia-help").unwrap().len(), 1);
            assert!(page.press_key("F1"));
            assert!(annotator.is_help_visible());
        }
    }

    mod announce_tests {
        use super::*;

        #[test]
        fn test_announce_then_clear() {
            let page = Rc::new(MockPage::new());
            let (annotator, _) = annotated(&page);
            annotator
                .announce_to_screen_reader("test", AnnouncePriority::Polite)
                .unwrap();
            let dom = page.dom();
            let region = dom.by_id(LIVE_REGION_ID).unwrap();
            assert_eq!(dom.text(region), "test");
            assert_eq!(dom.attr(region, "aria-live").as_deref(), Some("polite"));

            page.advance_time(999.0);
            assert_eq!(dom.text(region), "test");
            page.advance_time(1.0);
            assert_eq!(dom.text(region), "");
        }

        #[test]
        fn test_region_created_once() {
            let page = Rc::new(MockPage::new());
            let annotator = AccessibilityAnnotator::new(Rc::clone(&page));
            annotator
                .announce_to_screen_reader("one", AnnouncePriority::Polite)
                .unwrap();
            annotator
                .announce_to_screen_reader("two", AnnouncePriority::Assertive)
                .unwrap();
            let regions = page
                .dom()
                .query_all(&format!("#{LIVE_REGION_ID}"))
                .unwrap();
            assert_eq!(regions.len(), 1);
            assert_eq!(
                page.dom().attr(regions[0], "aria-live").as_deref(),
                Some("assertive")
            );
        }

        #[test]
        fn test_earlier_clear_erases_newer_message() {
            let page = Rc::new(MockPage::new());
            let annotator = AccessibilityAnnotator::new(Rc::clone(&page));
            annotator
                .announce_to_screen_reader("first", AnnouncePriority::Polite)
                .unwrap();
            page.advance_time(600.0);
            annotator
                .announce_to_screen_reader("second", AnnouncePriority::Polite)
                .unwrap();
            page.advance_time(400.0);
            let region = page.dom().by_id(LIVE_REGION_ID).unwrap();
            assert_eq!(page.dom().text(region), "");
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn test_init_idempotent() {
            let page = Rc::new(MockPage::new());
            button(&page, &[], "Jump");
            let (annotator, first) = annotated(&page);
            button(&page, &[], "Late");
            let second = annotator.init().unwrap();
            assert_eq!(first, second);
            assert_eq!(page.dom().query_all("#vigia-help").unwrap().len(), 1);
            assert_eq!(page.media_listeners(FORCED_COLORS), 1);
            assert!(annotator.is_initialized());
        }

        #[test]
        fn test_summary_json() {
            let json = serde_json::to_string(&AnnotationSummary::default()).unwrap();
            assert!(json.contains("\"buttons_labelled\":0"));
        }

        #[test]
        fn test_priority_strings() {
            assert_eq!(AnnouncePriority::Polite.to_string(), "polite");
            assert_eq!(AnnouncePriority::Assertive.as_str(), "assertive");
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_every_button_named(texts in proptest::collection::vec("[a-z ]{0,8}", 0..12)) {
                let page = Rc::new(MockPage::new());
                let nodes: Vec<NodeId> = texts.iter().map(|t| button(&page, &[], t)).collect();
                let (_annotator, summary) = annotated(&page);
                prop_assert_eq!(summary.buttons_labelled, nodes.len());
                for node in nodes {
                    let label = page.dom().attr(node, "aria-label");
                    prop_assert!(label.is_some_and(|l| !l.trim().is_empty()));
                }
            }
        }
    }
}
