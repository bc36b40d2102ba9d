//! Renderer-owned texture resource table
//!
//! Hardware-decode backends hand the sink frames whose pixels already
//! live in GPU textures. The sink never owns those resources; it holds a
//! [`TextureHandle`], a generation-checked index into a table the
//! renderer manages, so a recycled slot can never be mistaken for the
//! texture that used to live there.
//!
//! Release is deferred: a slot with frames still in flight on the render
//! thread stays alive until every [`TextureUse`] guard has been dropped
//! and its confirmation drained by [`TextureRegistry::collect`].

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::sample::PixelFormat;

/// Non-owning reference to a renderer-side texture.
///
/// Resolves against the [`TextureRegistry`] that issued it; a handle
/// whose slot has since been recycled resolves to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    index: u32,
    generation: u32,
}

/// Description of a registered texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub mip_levels: u8,
    pub label: Option<String>,
}

struct Slot {
    generation: u32,
    desc: Option<TextureDesc>,
    in_flight: u32,
    pending_release: bool,
}

struct RegistryState {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

/// Table of renderer-side textures with deferred release.
pub struct TextureRegistry {
    state: Mutex<RegistryState>,
    reclaim_tx: Sender<TextureHandle>,
    reclaim_rx: Receiver<TextureHandle>,
}

impl Default for TextureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        let (reclaim_tx, reclaim_rx) = unbounded();
        Self {
            state: Mutex::new(RegistryState {
                slots: Vec::new(),
                free: Vec::new(),
            }),
            reclaim_tx,
            reclaim_rx,
        }
    }

    /// Register a texture and return its handle.
    pub fn register(&self, desc: TextureDesc) -> TextureHandle {
        let mut state = self.state.lock();
        if let Some(index) = state.free.pop() {
            let slot = &mut state.slots[index as usize];
            slot.desc = Some(desc);
            slot.in_flight = 0;
            slot.pending_release = false;
            TextureHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = state.slots.len() as u32;
            state.slots.push(Slot {
                generation: 0,
                desc: Some(desc),
                in_flight: 0,
                pending_release: false,
            });
            TextureHandle {
                index,
                generation: 0,
            }
        }
    }

    /// Look up the description behind a handle.
    ///
    /// Returns `None` for stale handles (slot recycled or released).
    pub fn resolve(&self, handle: TextureHandle) -> Option<TextureDesc> {
        let state = self.state.lock();
        let slot = state.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.desc.clone()
    }

    /// Whether a handle still refers to a live texture.
    pub fn is_alive(&self, handle: TextureHandle) -> bool {
        let state = self.state.lock();
        state
            .slots
            .get(handle.index as usize)
            .is_some_and(|slot| slot.generation == handle.generation && slot.desc.is_some())
    }

    /// Mark a texture as in flight on the render thread.
    ///
    /// Returns a guard that holds the texture alive. The guard may move to
    /// another thread; dropping it sends a confirmation that takes effect
    /// at the next [`collect`](Self::collect). Returns `None` for stale
    /// handles.
    pub fn begin_use(&self, handle: TextureHandle) -> Option<TextureUse> {
        let mut state = self.state.lock();
        let slot = state.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || slot.desc.is_none() {
            return None;
        }
        slot.in_flight += 1;
        Some(TextureUse {
            reclaim: self.reclaim_tx.clone(),
            handle,
        })
    }

    /// Release a texture.
    ///
    /// If frames referencing it are still in flight the slot is only
    /// marked; the actual recycle happens in [`collect`](Self::collect)
    /// once the last in-flight use has confirmed completion.
    pub fn release(&self, handle: TextureHandle) {
        let mut state = self.state.lock();
        let Some(slot) = state.slots.get_mut(handle.index as usize) else {
            return;
        };
        if slot.generation != handle.generation || slot.desc.is_none() {
            return;
        }
        if slot.in_flight > 0 {
            slot.pending_release = true;
            tracing::debug!(index = handle.index, "texture release deferred, in flight");
        } else {
            Self::recycle(&mut state, handle.index);
        }
    }

    /// Drain in-flight confirmations and finalize deferred releases.
    ///
    /// Call from the lifecycle-owning thread once per frame. Returns the
    /// number of slots recycled.
    pub fn collect(&self) -> usize {
        let mut recycled = 0;
        loop {
            let handle = match self.reclaim_rx.try_recv() {
                Ok(handle) => handle,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            };
            let mut state = self.state.lock();
            let Some(slot) = state.slots.get_mut(handle.index as usize) else {
                continue;
            };
            if slot.generation != handle.generation {
                continue;
            }
            slot.in_flight = slot.in_flight.saturating_sub(1);
            if slot.pending_release && slot.in_flight == 0 {
                Self::recycle(&mut state, handle.index);
                recycled += 1;
            }
        }
        recycled
    }

    /// Number of live textures.
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.slots.iter().filter(|slot| slot.desc.is_some()).count()
    }

    /// Whether the registry holds no live textures.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn recycle(state: &mut RegistryState, index: u32) {
        let slot = &mut state.slots[index as usize];
        slot.desc = None;
        slot.pending_release = false;
        slot.generation = slot.generation.wrapping_add(1);
        state.free.push(index);
    }
}

/// RAII marker for a texture in flight on the render thread.
///
/// Dropping the guard confirms the frame is done with the texture; the
/// registry applies the confirmation at its next `collect`.
pub struct TextureUse {
    reclaim: Sender<TextureHandle>,
    handle: TextureHandle,
}

impl TextureUse {
    /// The handle this use refers to.
    pub fn handle(&self) -> TextureHandle {
        self.handle
    }
}

impl Drop for TextureUse {
    fn drop(&mut self) {
        // Registry gone means there is nothing left to reclaim into.
        let _ = self.reclaim.send(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(label: &str) -> TextureDesc {
        TextureDesc {
            width: 1920,
            height: 1080,
            format: PixelFormat::Bgra,
            mip_levels: 1,
            label: Some(label.to_string()),
        }
    }

    #[test]
    fn register_and_resolve() {
        let registry = TextureRegistry::new();
        let handle = registry.register(desc("a"));
        let resolved = registry.resolve(handle).unwrap();
        assert_eq!(resolved.width, 1920);
        assert_eq!(resolved.label.as_deref(), Some("a"));
    }

    #[test]
    fn stale_generation_resolves_to_none() {
        let registry = TextureRegistry::new();
        let first = registry.register(desc("a"));
        registry.release(first);
        // The slot gets recycled for a new texture.
        let second = registry.register(desc("b"));
        assert!(registry.resolve(first).is_none());
        assert_eq!(registry.resolve(second).unwrap().label.as_deref(), Some("b"));
    }

    #[test]
    fn release_waits_for_in_flight_use() {
        let registry = TextureRegistry::new();
        let handle = registry.register(desc("a"));

        let in_use = registry.begin_use(handle).unwrap();
        registry.release(handle);
        // Still resolvable while the render thread holds it.
        assert!(registry.resolve(handle).is_some());

        drop(in_use);
        assert_eq!(registry.collect(), 1);
        assert!(registry.resolve(handle).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn use_guard_crosses_threads() {
        let registry = TextureRegistry::new();
        let handle = registry.register(desc("a"));
        let in_use = registry.begin_use(handle).unwrap();

        let render = std::thread::spawn(move || {
            // Simulated draw from the texture, then confirm via drop.
            drop(in_use);
        });
        render.join().unwrap();

        registry.release(handle);
        assert!(registry.is_alive(handle));
        // collect applies the render thread's confirmation and finalizes
        // the deferred release.
        assert_eq!(registry.collect(), 1);
        assert!(!registry.is_alive(handle));
    }

    #[test]
    fn immediate_release_without_uses() {
        let registry = TextureRegistry::new();
        let handle = registry.register(desc("a"));
        registry.release(handle);
        assert!(!registry.is_alive(handle));
        assert!(registry.begin_use(handle).is_none());
    }
}
