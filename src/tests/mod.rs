// Copyright 2024 the Chancery Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

mod test_bidi;
mod test_editor;
mod test_layout;
mod test_registry;
mod utils;
