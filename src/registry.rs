use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};
use rayon::prelude::*;

use crate::dictionary::{Dictionary, OpenOptions};
use crate::error::{Result, StardictError};

/// One configured dictionary and, once loaded, its handle.
#[derive(Debug, Clone)]
pub struct DictionarySlot {
    pub display_name: String,
    pub path: PathBuf,
    pub handle: Option<Arc<Dictionary>>,
}

type SwitchListener = Box<dyn FnMut(usize, &Arc<Dictionary>) + Send>;

/// The set of dictionaries a viewer can switch between.
pub struct Registry {
    slots: Vec<DictionarySlot>,
    active: usize,
    options: OpenOptions,
    listeners: Vec<SwitchListener>,
}

impl Registry {
    pub fn new(options: OpenOptions) -> Self {
        Self {
            slots: Vec::new(),
            active: 0,
            options,
            listeners: Vec::new(),
        }
    }

    /// Queue a dictionary for [`Registry::load_all`]. An empty display name
    /// is replaced by the book name once loaded.
    pub fn add(&mut self, display_name: impl Into<String>, path: impl Into<PathBuf>) {
        self.slots.push(DictionarySlot {
            display_name: display_name.into(),
            path: path.into(),
            handle: None,
        });
    }

    /// Register a dictionary that is already open.
    pub fn add_loaded(&mut self, display_name: impl Into<String>, dict: Arc<Dictionary>) {
        let mut display_name = display_name.into();
        if display_name.is_empty() {
            display_name = dict.name().to_string();
        }
        self.slots.push(DictionarySlot {
            display_name,
            path: dict.info().path.clone(),
            handle: Some(dict),
        });
    }

    /// Open every slot that has no handle yet, one job per dictionary on a
    /// pool of at most `threads` workers (all cores when `None`). The first
    /// failure aborts the batch; nothing is installed in that case.
    pub fn load_all(&mut self, threads: Option<usize>) -> Result<()> {
        let pending: Vec<(usize, String, PathBuf)> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.handle.is_none())
            .map(|(i, slot)| (i, slot.display_name.clone(), slot.path.clone()))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let workers = threads.unwrap_or(cores).clamp(1, pending.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| StardictError::Io(format!("cannot start loader threads: {}", e)))?;
        debug!("loading {} dictionaries on {} threads", pending.len(), workers);

        let options = self.options;
        let loaded: Vec<(usize, Arc<Dictionary>)> = pool.install(|| {
            pending
                .par_iter()
                .map(|(i, name, path)| {
                    let context = if name.is_empty() {
                        path.display().to_string()
                    } else {
                        name.clone()
                    };
                    Dictionary::open_with(path, &options)
                        .map(|d| (*i, Arc::new(d)))
                        .map_err(|e| e.context(&context))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        for (i, dict) in loaded {
            let slot = &mut self.slots[i];
            if slot.display_name.is_empty() {
                slot.display_name = dict.name().to_string();
            }
            slot.handle = Some(dict);
        }
        info!("{} dictionaries ready", self.slots.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[DictionarySlot] {
        &self.slots
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> Option<&Arc<Dictionary>> {
        self.slots.get(self.active).and_then(|s| s.handle.as_ref())
    }

    /// Call `listener` with the new index and handle after every switch.
    pub fn on_switch<F>(&mut self, listener: F)
    where
        F: FnMut(usize, &Arc<Dictionary>) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Make slot `index` active and return its dictionary.
    pub fn set_active(&mut self, index: usize) -> Result<Arc<Dictionary>> {
        let slot = self.slots.get(index).ok_or_else(|| {
            StardictError::InvalidArgument(format!(
                "no dictionary {} (have {})",
                index,
                self.slots.len()
            ))
        })?;
        let dict = slot.handle.clone().ok_or_else(|| {
            StardictError::InvalidArgument(format!("`{}' is not loaded", slot.display_name))
        })?;

        self.active = index;
        debug!("active dictionary is now {} `{}'", index, slot.display_name);
        for listener in &mut self.listeners {
            listener(index, &dict);
        }
        Ok(dict)
    }

    /// Cycle forward, wrapping around.
    pub fn next(&mut self) -> Result<Arc<Dictionary>> {
        if self.slots.is_empty() {
            return Err(StardictError::InvalidArgument("no dictionaries".to_string()));
        }
        self.set_active((self.active + 1) % self.slots.len())
    }

    /// Cycle backward, wrapping around.
    pub fn prev(&mut self) -> Result<Arc<Dictionary>> {
        if self.slots.is_empty() {
            return Err(StardictError::InvalidArgument("no dictionaries".to_string()));
        }
        let len = self.slots.len();
        self.set_active((self.active + len - 1) % len)
    }
}
