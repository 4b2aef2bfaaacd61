// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Conductor Sandbox
// Drives a few stub subsystems through a fixed-rate frame loop.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use conductor_control::lifecycle::SYSTEM_ERROR;
use conductor_control::{IntegrationConfig, IntegrationManager};
use conductor_core::utils::timer::Stopwatch;
use conductor_core::{payload, Event, EventHandler, Priority, Subsystem, SubsystemContext};
use serde_json::json;

const FRAMES: u32 = 180;
const FRAME_TIME: Duration = Duration::from_micros(16_667);

/// Integrates a falling body and announces when it hits the ground.
struct Physics {
    height: f32,
    velocity: f32,
}

impl Subsystem for Physics {
    fn initialize(&mut self) -> Result<()> {
        log::info!("Physics: dropping body from {:.1} m", self.height);
        Ok(())
    }

    fn update(&mut self, ctx: &SubsystemContext<'_>) -> Result<()> {
        self.velocity -= 9.81 * ctx.delta_time;
        self.height += self.velocity * ctx.delta_time;
        if self.height <= 0.0 {
            self.height = 0.0;
            self.velocity = -self.velocity * 0.5;
            ctx.events
                .emit("body_landed", payload([("speed", json!(self.velocity))]), false);
        }
        Ok(())
    }
}

/// Counts rendered frames.
#[derive(Default)]
struct Renderer {
    frames: u64,
}

impl Subsystem for Renderer {
    fn update(&mut self, _: &SubsystemContext<'_>) -> Result<()> {
        self.frames += 1;
        thread::sleep(Duration::from_micros(500));
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        log::info!("Renderer: presented {} frames", self.frames);
        Ok(())
    }
}

/// Fails every third tick for a while, then breaks for good.
#[derive(Default)]
struct Ai {
    ticks: u32,
}

impl Subsystem for Ai {
    fn update(&mut self, _: &SubsystemContext<'_>) -> Result<()> {
        self.ticks += 1;
        if self.ticks > 120 {
            anyhow::bail!("navmesh corrupted at tick {}", self.ticks);
        }
        if self.ticks % 3 == 0 {
            anyhow::bail!("path not found");
        }
        Ok(())
    }
}

struct Audio;

impl Subsystem for Audio {
    fn update(&mut self, _: &SubsystemContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Background subsystem writing periodic checkpoints.
#[derive(Default)]
struct Autosave {
    saves: u32,
}

impl Subsystem for Autosave {
    fn update(&mut self, ctx: &SubsystemContext<'_>) -> Result<()> {
        self.saves += 1;
        log::debug!("Autosave: checkpoint {} ({:.3}s since last)", self.saves, ctx.delta_time);
        Ok(())
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = IntegrationConfig {
        background_interval_ms: 250,
        ..Default::default()
    };
    let mut manager = IntegrationManager::new(config)?;

    manager.register_subsystem(
        "physics",
        Physics {
            height: 10.0,
            velocity: 0.0,
        },
        Priority::Critical,
        &[],
    )?;
    manager.register_subsystem("renderer", Renderer::default(), Priority::High, &["physics"])?;
    manager.register_subsystem("ai", Ai::default(), Priority::Normal, &["physics", "navmesh"])?;
    manager.register_subsystem("audio", Audio, Priority::Low, &[])?;
    manager.register_subsystem("autosave", Autosave::default(), Priority::Background, &[])?;

    let on_error: EventHandler = Arc::new(|event: &Event| -> Result<()> {
        log::warn!(
            "Sandbox: '{}' reported an error: {}",
            event.get_str("system_name").unwrap_or("?"),
            event.get_str("error_message").unwrap_or("?")
        );
        Ok(())
    });
    manager.subscribe(SYSTEM_ERROR, on_error);
    let on_landing: EventHandler = Arc::new(|event: &Event| -> Result<()> {
        let speed = event.get("speed").and_then(|v| v.as_f64()).unwrap_or_default();
        log::info!("Sandbox: body landed, bounce speed {speed:.2} m/s");
        Ok(())
    });
    manager.subscribe("body_landed", on_landing);

    if !manager.initialize_all() {
        anyhow::bail!("a critical subsystem failed to initialize");
    }
    log::info!("Sandbox: execution order {:?}", manager.execution_order());

    let mut clock = Stopwatch::new();
    for frame in 0..FRAMES {
        let delta_time = clock.restart().as_secs_f32();
        if let Some(sample) = manager.update_all(delta_time) {
            log::trace!("Sandbox: frame {frame} took {:.3} ms", sample.total_ms);
        }
        if frame == 60 {
            manager.pause("audio");
        } else if frame == 90 {
            manager.resume("audio");
        }

        let spent = clock.elapsed();
        if spent < FRAME_TIME {
            thread::sleep(FRAME_TIME - spent);
        }
    }

    log::info!(
        "Sandbox: frame report {}",
        serde_json::to_string_pretty(&manager.frame_report())?
    );
    log::info!(
        "Sandbox: snapshot {}",
        serde_json::to_string_pretty(&manager.snapshot())?
    );
    if let Some(ai) = manager.subsystem_status("ai") {
        log::info!("Sandbox: ai is {} ({:?})", ai.state, ai.last_error);
    }

    manager.shutdown();
    Ok(())
}
