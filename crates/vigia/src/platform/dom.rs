//! DOM access used by the accessibility annotator.

use crate::result::VigiaResult;

/// Query and mutation surface of an HTML document
///
/// Element handles are cheap to clone (a node id, or a `web_sys::Element`).
pub trait Document {
    /// Element handle
    type Element: Clone + 'static;

    /// All elements matching a CSS selector list, in document order
    fn query_all(&self, selector: &str) -> VigiaResult<Vec<Self::Element>>;

    /// Element with the given `id`
    fn element_by_id(&self, id: &str) -> Option<Self::Element>;

    /// The `<html>` element
    fn root_element(&self) -> Option<Self::Element>;

    /// Create a detached element
    fn create_element(&self, tag: &str) -> VigiaResult<Self::Element>;

    /// Append to `<head>`
    fn append_to_head(&self, element: &Self::Element) -> VigiaResult<()>;

    /// Append to `<body>`
    fn append_to_body(&self, element: &Self::Element) -> VigiaResult<()>;

    /// Append `child` to `parent`
    fn append_child(&self, parent: &Self::Element, child: &Self::Element) -> VigiaResult<()>;

    /// Detach an element from its parent
    fn remove(&self, element: &Self::Element);

    /// Lowercase tag name
    fn tag_name(&self, element: &Self::Element) -> String;

    /// Attribute value
    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;

    /// Set an attribute
    fn set_attribute(&self, element: &Self::Element, name: &str, value: &str) -> VigiaResult<()>;

    /// Remove an attribute
    fn remove_attribute(&self, element: &Self::Element, name: &str) -> VigiaResult<()>;

    /// Concatenated descendant text
    fn text_content(&self, element: &Self::Element) -> String;

    /// Replace children with a single text node
    fn set_text_content(&self, element: &Self::Element, text: &str);

    /// Add a class
    fn add_class(&self, element: &Self::Element, class: &str) -> VigiaResult<()>;

    /// Remove a class
    fn remove_class(&self, element: &Self::Element, class: &str) -> VigiaResult<()>;

    /// Whether the element carries a class
    fn has_class(&self, element: &Self::Element, class: &str) -> bool;
}

/// Document-level `keydown` subscription
pub trait KeyboardEvents {
    /// Subscribe to key presses; the handler receives `KeyboardEvent.key`
    /// and returns `true` when it consumed the key (default prevented)
    fn on_key_down(&self, handler: Box<dyn FnMut(&str) -> bool>);
}

/// `matchMedia` with change notification
pub trait MediaQueries {
    /// Evaluate `query` now and call `on_change` whenever the result flips
    fn watch_media(&self, query: &str, on_change: Box<dyn FnMut(bool)>) -> VigiaResult<bool>;
}
