// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{Message, TestOutcomeState};
use proptest::prelude::*;

impl Arbitrary for TestOutcomeState {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        proptest::sample::select(TestOutcomeState::ALL.to_vec()).boxed()
    }
}

impl Arbitrary for Message {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        // A small set of paths, so that generated batches frequently share files, optionally
        // qualified with a drive letter.
        let path = proptest::sample::select(vec![
            "/a.php",
            "/src/b.php",
            "/tests/Unit/FooTest.php",
            "/tests/Feature/BarTest.php",
        ]);
        let drive = proptest::option::of(proptest::char::range('A', 'Z'));

        (drive, path, any::<TestOutcomeState>(), "[a-z_]{1,12}")
            .prop_map(|(drive, path, state, name)| {
                let file_name = match drive {
                    Some(drive) => format!("{drive}:{path}"),
                    None => path.to_owned(),
                };
                Message::new(file_name, state).with_name(name)
            })
            .boxed()
    }
}
