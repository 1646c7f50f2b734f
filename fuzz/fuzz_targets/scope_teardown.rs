#![no_main]

use lattice_di::{ContainerBuilder, Dispose, DisposeResult};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

struct Flaky {
    fail: bool,
}

impl Dispose for Flaky {
    fn dispose(&self) -> DisposeResult {
        if self.fail {
            Err("flaky teardown".into())
        } else {
            Ok(())
        }
    }
}

// Teardown must visit every disposable exactly once, in reverse order,
// no matter which ones fail; a second dispose must be a no-op.
fuzz_target!(|data: &[u8]| {
    let container = ContainerBuilder::new().build();
    let scope = container.create_scope();

    for byte in data.iter().take(64) {
        scope.register_for_disposal(Arc::new(Flaky {
            fail: byte % 2 == 0,
        }));
        if byte % 5 == 0 {
            scope.on_scope_end(|| Ok(()));
        }
    }

    let _ = scope.dispose();
    let _ = scope.dispose();
});
