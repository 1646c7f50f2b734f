#![no_main]

use lattice_di::{ContainerBuilder, Lifetime, Resolver};
use libfuzzer_sys::fuzz_target;

// Drive registration and resolution with fuzzer-chosen lifetimes and
// conditional guards; nothing here should panic or hang.
fuzz_target!(|data: &[u8]| {
    let mut builder = ContainerBuilder::new();

    let lifetime = match data.first().copied().unwrap_or(0) % 3 {
        0 => Lifetime::Transient,
        1 => Lifetime::Scoped,
        _ => Lifetime::Singleton,
    };
    let value = data.get(1).copied().unwrap_or(0) as u64;

    if builder
        .register::<u64, _>(lifetime, move |_| value)
        .is_err()
    {
        return;
    }

    let guard = data.get(2).copied().unwrap_or(0) % 2 == 0;
    builder.register_conditional::<u32, _, _>(
        Lifetime::Transient,
        |_| 7u32,
        move |_| guard,
    );

    let container = builder.build();
    let _ = container.verify();

    let scope = container.create_scope();
    let _guard = scope.enter();
    let _ = container.get::<u64>();
    let _ = container.get::<u32>();
    drop(_guard);
    let _ = scope.dispose();
    let _ = container.dispose();
});
