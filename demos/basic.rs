//! Basic usage of ObjectPool with both kinds of pooled types

use recycle_pool::{ObjectPool, PoolConfiguration, PooledResource, Wrapped};

/// A type that knows how to reset itself
struct Session {
    user: Option<String>,
    requests: u32,
}

impl PooledResource for Session {
    fn reset_state(&mut self) -> bool {
        self.user = None;
        self.requests = 0;
        true
    }
}

fn main() {
    println!("=== recycle_pool - Basic Examples ===\n");

    native_resource();
    wrapped_resource();
    metrics_and_health();
}

fn native_resource() {
    println!("1. Native PooledResource:");
    let pool = ObjectPool::bounded(5, 25, || {
        Ok::<_, std::io::Error>(Session { user: None, requests: 0 })
    })
    .unwrap();

    {
        let mut session = pool.acquire().unwrap();
        session.user = Some("alice".to_string());
        session.requests += 1;
        println!("   In use by {:?}, idle: {}", session.user, pool.idle_count());
    }

    let session = pool.acquire().unwrap();
    println!("   Reused session user after reset: {:?}\n", session.user);
}

fn wrapped_resource() {
    println!("2. Wrapped external type:");
    let pool = ObjectPool::from_fn(
        || {
            Wrapped::with_hooks(
                String::with_capacity(256),
                |s: &mut String| {
                    s.clear();
                    true
                },
                |s: &mut String| println!("   Releasing buffer of {} bytes", s.capacity()),
            )
        },
        PoolConfiguration::new().with_max_size(2),
    )
    .unwrap();

    {
        let mut text = pool.acquire().unwrap();
        text.push_str("hello");
        println!("   Wrote: {}", text.get());
    }

    pool.dispose();
    println!();
}

fn metrics_and_health() {
    println!("3. Metrics and Health:");
    let pool = ObjectPool::bounded(2, 4, || Ok::<_, std::io::Error>(Vec::<u8>::new())).unwrap();

    {
        let _a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();

        let health = pool.health_status();
        println!("   Health: {}", if health.is_healthy() { "Healthy" } else { "Unhealthy" });
        println!("   Utilization: {:.1}%", health.utilization * 100.0);
    }

    for (key, value) in pool.export_metrics() {
        println!("     {}: {}", key, value);
    }
}
