// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Batch save/load driver.
//!
//! # Saving
//!
//! ```text
//! save(decl, value, default)*  -> built trees in the caller's arena
//! write()                      -> note schemas, encode payloads, frame blob
//! ```
//!
//! # Loading
//!
//! [`BatchLoader::new`] validates the blob, mounts its schemas in the context
//! and resolves a load plan. Records are then replayed in order or by index.
//! Dropping the loader unmounts the schemas.

use crate::build::BuiltStruct;
use crate::config::SchemaFormat;
use crate::context::{Context, MountId};
use crate::error::{LoadError, SaveError};
use crate::ids::{join_type_name, DeclId};
use crate::load::{LoadPlan, StructLoader};
use crate::read::{read_batch, BatchView};
use crate::save::StructSaver;
use crate::schema::{NotedSchemas, SchemaBatch, SchemasBuilder};
use crate::ser::ByteWriter;
use crate::value::StructValue;
use crate::write::{encode_built_struct, write_blob};
use bumpalo::Bump;
use std::sync::Arc;

/// Collects objects of one batch.
///
/// Built trees live in `bump`; the caller drops or resets it after
/// [`BatchSaver::write`].
pub struct BatchSaver<'c, 'a> {
    saver: StructSaver<'c, 'a>,
    format: SchemaFormat,
    objects: Vec<&'a BuiltStruct<'a>>,
}

impl<'c, 'a> BatchSaver<'c, 'a> {
    /// Saver using the context's configured schema format.
    pub fn new(ctx: &'c Context, bump: &'a Bump) -> Self {
        Self::with_format(ctx, bump, ctx.config().schema_format)
    }

    pub fn with_format(ctx: &'c Context, bump: &'a Bump, format: SchemaFormat) -> Self {
        Self {
            saver: StructSaver::new(ctx, bump),
            format,
            objects: Vec::new(),
        }
    }

    /// Build one object, delta-encoded against `default` when given.
    /// Returns the object's index in the batch.
    pub fn save(
        &mut self,
        decl: DeclId,
        value: &StructValue,
        default: Option<&StructValue>,
    ) -> Result<usize, SaveError> {
        let built = self.saver.save_object(decl, value, default)?;
        self.objects.push(built);
        log::trace!(
            "[plainprops] saved object {} of {} ({} members)",
            self.objects.len() - 1,
            self.saver.ctx.type_name(decl),
            built.members.len()
        );
        Ok(self.objects.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn format(&self) -> SchemaFormat {
        self.format
    }

    fn finish(&self) -> Result<(NotedSchemas, Vec<u32>), SaveError> {
        let mut builder = SchemasBuilder::new(self.saver.ctx);
        let mut indices = Vec::with_capacity(self.objects.len());
        for built in &self.objects {
            indices.push(builder.note_struct(built)?);
        }
        Ok((builder.build()?, indices))
    }

    /// Encode every saved object into a blob.
    pub fn write(&self) -> Result<Vec<u8>, SaveError> {
        let (noted, indices) = self.finish()?;
        let mut records = Vec::with_capacity(self.objects.len());
        for (built, idx) in self.objects.iter().zip(indices) {
            let mut w = ByteWriter::new();
            encode_built_struct(&mut w, &noted, built)?;
            records.push((idx, w.into_inner()));
        }
        Ok(write_blob(
            self.format,
            &noted.batch,
            &self.saver.ctx.names,
            &records,
        )?)
    }

    /// Live declaration of each struct schema index, in schema order.
    pub fn runtime_ids(&self) -> Result<Vec<DeclId>, SaveError> {
        Ok(self.finish()?.0.decls)
    }
}

/// Replays the objects of one blob.
pub struct BatchLoader<'c, 'b> {
    ctx: &'c Context,
    view: BatchView<'b>,
    schemas: Arc<SchemaBatch>,
    plan: LoadPlan,
    mount: MountId,
    next: usize,
}

impl<'c, 'b> BatchLoader<'c, 'b> {
    pub fn new(ctx: &'c Context, bytes: &'b [u8], format: SchemaFormat) -> Result<Self, LoadError> {
        let view = read_batch(bytes, format)?;
        let schemas = Arc::new(view.schemas.clone());
        let plan = LoadPlan::new(ctx, view.names.as_deref(), &schemas);
        let mount = ctx.mount(Arc::clone(&schemas));
        Ok(Self {
            ctx,
            view,
            schemas,
            plan,
            mount,
            next: 0,
        })
    }

    pub fn num_objects(&self) -> usize {
        self.view.objects.len()
    }

    /// Live type of object `i`, if its saved type is declared.
    pub fn object_type(&self, i: usize) -> Option<DeclId> {
        let record = self.view.objects.get(i)?;
        self.plan.struct_decl(record.schema)
    }

    /// Load object `i` onto `dst`. An empty `dst` starts from the type's
    /// default instance.
    pub fn load(&self, i: usize, dst: &mut StructValue) -> Result<DeclId, LoadError> {
        let record = self.view.objects.get(i).ok_or(LoadError::ObjectIndex {
            index: i,
            len: self.view.objects.len(),
        })?;
        let decl = self
            .plan
            .struct_decl(record.schema)
            .filter(|&d| self.ctx.is_bound(d))
            .ok_or_else(|| LoadError::UnboundType(self.saved_type_name(record.schema)))?;
        let read = self.view.read_object(i)?;
        if dst.is_empty() {
            *dst = self
                .ctx
                .new_instance(decl)
                .unwrap_or_else(|| self.ctx.zero_struct(decl));
        }
        StructLoader::new(self.ctx, &self.plan, &self.schemas).load_struct(decl, &read, dst)?;
        log::trace!(
            "[plainprops] loaded object {} as {}",
            i,
            self.ctx.type_name(decl)
        );
        Ok(decl)
    }

    /// Load the next object in order; `None` after the last one.
    pub fn load_next(&mut self, dst: &mut StructValue) -> Result<Option<DeclId>, LoadError> {
        if self.next >= self.num_objects() {
            return Ok(None);
        }
        let decl = self.load(self.next, dst)?;
        self.next += 1;
        Ok(Some(decl))
    }

    /// Load object `i` into a fresh default instance.
    pub fn load_new(&self, i: usize) -> Result<(DeclId, StructValue), LoadError> {
        let mut dst = StructValue::default();
        let decl = self.load(i, &mut dst)?;
        Ok((decl, dst))
    }

    pub fn schemas(&self) -> &SchemaBatch {
        &self.schemas
    }

    pub fn names(&self) -> Option<&[String]> {
        self.view.names.as_deref()
    }

    pub fn view(&self) -> &BatchView<'b> {
        &self.view
    }

    pub fn mount_id(&self) -> MountId {
        self.mount
    }

    fn saved_type_name(&self, schema: u32) -> String {
        match self.schemas.structs.get(schema as usize) {
            Some(s) => join_type_name(
                &self.plan.describe(self.ctx, s.scope),
                &self.plan.describe(self.ctx, s.name),
            ),
            None => format!("schema#{}", schema),
        }
    }
}

impl Drop for BatchLoader<'_, '_> {
    fn drop(&mut self) {
        self.ctx.unmount(self.mount);
    }
}
