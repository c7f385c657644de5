// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod constants;
pub mod error;
pub mod kubernetes;
pub mod matchers;
pub mod mutation;
pub mod reconcilers;
pub mod store;
pub mod tracker;
pub mod types;

#[cfg(test)]
pub mod test_utils;
