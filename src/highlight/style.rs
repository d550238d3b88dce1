//! Turns a registry snapshot into the ordered list of outlines to draw.

use crate::highlight::geometry::ScreenRect;
use crate::highlight::model::{Context, EnabledContexts, HighlightStyle, StyleTable};
use crate::highlight::registry::RegionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawInstruction {
    pub context: Context,
    pub rect: ScreenRect,
    pub style: HighlightStyle,
}

/// Derives draw instructions for one frame.
///
/// Only enabled contexts with a rectangle take part. When focus and navigator
/// sit on exactly the same rectangle they are replaced by a single
/// `FocusNavigator` outline; overlapping but unequal rectangles stay separate.
/// The result is ordered by [`Context`] so a given snapshot always renders
/// the same way.
pub fn draw_instructions(
    snapshot: &RegionSnapshot,
    enabled: EnabledContexts,
    styles: &StyleTable,
) -> Vec<DrawInstruction> {
    let mut entries: Vec<(Context, ScreenRect)> = snapshot
        .iter()
        .filter(|(context, _)| enabled.contains(*context))
        .collect();

    let focus = entries.iter().find(|(c, _)| *c == Context::Focus).map(|e| e.1);
    let navigator = entries
        .iter()
        .find(|(c, _)| *c == Context::Navigator)
        .map(|e| e.1);
    if let (Some(focus), Some(navigator)) = (focus, navigator) {
        if focus == navigator {
            entries.retain(|(c, _)| !matches!(c, Context::Focus | Context::Navigator));
            entries.push((Context::FocusNavigator, focus));
        }
    }

    entries.sort_by_key(|(context, _)| *context);
    entries
        .into_iter()
        .map(|(context, rect)| DrawInstruction {
            context,
            rect,
            style: styles.style_for(context),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(rects: &[(Context, ScreenRect)]) -> RegionSnapshot {
        RegionSnapshot::from_rects(rects.iter().copied())
    }

    #[test]
    fn coinciding_focus_and_navigator_merge() {
        let rect = ScreenRect::new(10, 10, 50, 20);
        let styles = StyleTable::default();
        let out = draw_instructions(
            &snapshot(&[(Context::Focus, rect), (Context::Navigator, rect)]),
            EnabledContexts::ALL,
            &styles,
        );
        assert_eq!(
            out,
            vec![DrawInstruction {
                context: Context::FocusNavigator,
                rect,
                style: styles.focus_navigator,
            }]
        );
    }

    #[test]
    fn one_pixel_difference_keeps_both() {
        let out = draw_instructions(
            &snapshot(&[
                (Context::Focus, ScreenRect::new(10, 10, 50, 20)),
                (Context::Navigator, ScreenRect::new(10, 10, 51, 20)),
            ]),
            EnabledContexts::ALL,
            &StyleTable::default(),
        );
        let contexts: Vec<_> = out.iter().map(|i| i.context).collect();
        assert_eq!(contexts, vec![Context::Focus, Context::Navigator]);
    }

    #[test]
    fn merge_needs_navigator_enabled() {
        let rect = ScreenRect::new(0, 0, 5, 5);
        let enabled = EnabledContexts {
            navigator: false,
            ..EnabledContexts::ALL
        };
        let out = draw_instructions(
            &snapshot(&[(Context::Focus, rect), (Context::Navigator, rect)]),
            enabled,
            &StyleTable::default(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].context, Context::Focus);
    }

    #[test]
    fn disabled_context_is_not_drawn_even_if_stale() {
        let enabled = EnabledContexts {
            browse_mode: false,
            ..EnabledContexts::ALL
        };
        let out = draw_instructions(
            &snapshot(&[(Context::BrowseMode, ScreenRect::new(1, 1, 1, 1))]),
            enabled,
            &StyleTable::default(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn order_is_fixed_and_repeatable_for_every_subset() {
        let styles = StyleTable::default();
        let focus = ScreenRect::new(1, 1, 1, 1);
        let browse = ScreenRect::new(3, 3, 3, 3);
        for navigator in [focus, ScreenRect::new(2, 2, 2, 2)] {
            let snap = snapshot(&[
                (Context::BrowseMode, browse),
                (Context::Navigator, navigator),
                (Context::Focus, focus),
            ]);
            for bits in 0..8u8 {
                let enabled = EnabledContexts {
                    focus: bits & 1 != 0,
                    navigator: bits & 2 != 0,
                    browse_mode: bits & 4 != 0,
                };
                let first = draw_instructions(&snap, enabled, &styles);
                assert_eq!(first, draw_instructions(&snap, enabled, &styles));

                let mut expected = Vec::new();
                if enabled.focus && enabled.navigator && navigator == focus {
                    expected.push(Context::FocusNavigator);
                } else {
                    if enabled.focus {
                        expected.push(Context::Focus);
                    }
                    if enabled.navigator {
                        expected.push(Context::Navigator);
                    }
                }
                if enabled.browse_mode {
                    expected.push(Context::BrowseMode);
                }
                let contexts: Vec<_> = first.iter().map(|i| i.context).collect();
                assert_eq!(contexts, expected, "enabled {enabled:?}, navigator {navigator:?}");
            }
        }
    }

    #[test]
    fn merged_outline_keeps_browse_mode_after_it() {
        let rect = ScreenRect::new(4, 4, 4, 4);
        let out = draw_instructions(
            &snapshot(&[
                (Context::Focus, rect),
                (Context::Navigator, rect),
                (Context::BrowseMode, ScreenRect::new(9, 9, 1, 9)),
            ]),
            EnabledContexts::ALL,
            &StyleTable::default(),
        );
        let contexts: Vec<_> = out.iter().map(|i| i.context).collect();
        assert_eq!(contexts, vec![Context::FocusNavigator, Context::BrowseMode]);
    }
}
