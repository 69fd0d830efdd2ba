/// A document checkbox in a folder listing. Its value is the document id.
pub trait Checkbox {
    fn is_checked(&self) -> bool;
    fn set_checked(&self, checked: bool);
    fn is_disabled(&self) -> bool;
    fn value(&self) -> String;
}

/// Checks every enabled box. Disabled boxes mark documents that are not
/// eligible for the current action and are never touched.
pub fn select_all<C: Checkbox>(boxes: &[C]) {
    for checkbox in boxes.iter().filter(|checkbox| !checkbox.is_disabled()) {
        checkbox.set_checked(true);
    }
}

/// Unchecks every box, disabled ones included.
pub fn deselect_all<C: Checkbox>(boxes: &[C]) {
    for checkbox in boxes {
        checkbox.set_checked(false);
    }
}

/// Mirrors the state of a "select all" toggle onto the listing.
pub fn apply_toggle<C: Checkbox>(boxes: &[C], checked: bool) {
    if checked {
        select_all(boxes);
    } else {
        deselect_all(boxes);
    }
}

/// Ids of the checked documents in listing order. Values that are not
/// integers are skipped.
pub fn selected_ids<C: Checkbox>(boxes: &[C]) -> Vec<i64> {
    boxes
        .iter()
        .filter(|checkbox| checkbox.is_checked())
        .filter_map(|checkbox| checkbox.value().trim().parse().ok())
        .collect()
}

/// Like [`selected_ids`] but ignores boxes that were disabled after being
/// checked.
pub fn selected_enabled_ids<C: Checkbox>(boxes: &[C]) -> Vec<i64> {
    boxes
        .iter()
        .filter(|checkbox| checkbox.is_checked() && !checkbox.is_disabled())
        .filter_map(|checkbox| checkbox.value().trim().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCheckbox;

    fn listing() -> Vec<FakeCheckbox> {
        vec![
            FakeCheckbox::new("1", false),
            FakeCheckbox::new("2", true),
            FakeCheckbox::new("3", false),
            FakeCheckbox::new("not-a-number", false),
        ]
    }

    #[test]
    fn select_all_never_checks_disabled_boxes() {
        let boxes = listing();
        select_all(&boxes);
        assert!(boxes[0].is_checked());
        assert!(!boxes[1].is_checked());
        assert!(boxes[2].is_checked());
        assert_eq!(selected_ids(&boxes), vec![1, 3]);
    }

    #[test]
    fn deselect_all_clears_disabled_boxes_too() {
        let boxes = listing();
        boxes[1].set_checked(true);
        select_all(&boxes);
        deselect_all(&boxes);
        assert!(boxes.iter().all(|checkbox| !checkbox.is_checked()));
        assert!(selected_ids(&boxes).is_empty());
    }

    #[test]
    fn toggle_follows_checked_state() {
        let boxes = listing();
        apply_toggle(&boxes, true);
        assert_eq!(selected_ids(&boxes), vec![1, 3]);
        apply_toggle(&boxes, false);
        assert_eq!(selected_ids(&boxes), Vec::<i64>::new());
    }

    #[test]
    fn enabled_ids_skip_boxes_disabled_after_checking() {
        let boxes = listing();
        boxes[0].set_checked(true);
        boxes[1].set_checked(true);
        assert_eq!(selected_ids(&boxes), vec![1, 2]);
        assert_eq!(selected_enabled_ids(&boxes), vec![1]);
    }
}
