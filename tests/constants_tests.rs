// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use framefx::constants::{FilterGroup, FilterType, KernelKind};
use std::collections::HashSet;

#[test]
fn test_filter_catalogue_size() {
    assert_eq!(FilterType::ALL.len(), 42);
    let unique: HashSet<FilterType> = FilterType::ALL.into_iter().collect();
    assert_eq!(unique.len(), FilterType::ALL.len());
}

#[test]
fn test_filter_names_parse_loosely() {
    assert_eq!(FilterType::from_name("PixellateMetal"), Some(FilterType::PixellateMetal));
    assert_eq!(FilterType::from_name("pixellate-metal"), Some(FilterType::PixellateMetal));
    assert_eq!(FilterType::from_name(" cmyk_halftone "), Some(FilterType::CmykHalftone));
    assert_eq!(FilterType::from_name("Bumpy"), None);
}

#[test]
fn test_only_rating_groups_are_virtual() {
    let virtual_groups: Vec<FilterGroup> =
        FilterGroup::ALL.into_iter().filter(|g| g.is_virtual()).collect();
    assert_eq!(virtual_groups, vec![FilterGroup::Favorites, FilterGroup::FiveStar]);
}

#[test]
fn test_group_ids_are_unique() {
    let ids: HashSet<uuid::Uuid> = FilterGroup::ALL.iter().map(|g| g.id()).collect();
    assert_eq!(ids.len(), FilterGroup::ALL.len());
}

#[test]
fn test_kernel_kind_display_names() {
    assert!(!KernelKind::Graph.display_name().is_empty());
    assert_ne!(KernelKind::Graph.display_name(), KernelKind::Compute.display_name());
}
