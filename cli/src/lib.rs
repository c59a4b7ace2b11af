// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0

//! gateway CLI library - exposes testable components

pub mod client;
pub mod commands;
