//! Operation binders.
//!
//! Each binder optionally merges criteria (and an update document or options
//! where the operation takes them), validates the accumulated state against
//! the new operation kind, and only then binds it. The whole call is staged
//! on a copy, so a rejected binder changes nothing.

use bson::Document;

use crate::{
    error::QueryResult,
    query::{Criteria, Query},
    specification::OperationKind,
};

impl Query {
    fn bind_staged<F>(&mut self, op: OperationKind, build: F) -> QueryResult<&mut Self>
    where
        F: FnOnce(&mut Query) -> QueryResult<()>,
    {
        let mut staged = self.clone();
        build(&mut staged)?;
        staged.bind_op(op)?;

        *self = staged;
        Ok(self)
    }

    fn bind_update<C>(
        &mut self,
        op: OperationKind,
        criteria: Option<C>,
        update: Option<Document>,
        options: Option<Document>,
    ) -> QueryResult<&mut Self>
    where
        C: Into<Criteria>,
    {
        self.bind_staged(op, |query| {
            if let Some(criteria) = criteria {
                query.merge(criteria);
            }
            if let Some(update) = update {
                query.merge_update(update);
            }
            if op == OperationKind::ReplaceOne {
                query.spec.options.insert("overwrite", true);
            }
            if let Some(options) = options {
                query.set_options(options)?;
            }
            Ok(())
        })
    }

    /// Binds `find`.
    pub fn find(&mut self) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::Find, |_| Ok(()))
    }

    /// Merges `criteria` and binds `find`.
    pub fn find_by(&mut self, criteria: impl Into<Criteria>) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::Find, |query| {
            query.merge(criteria);
            Ok(())
        })
    }

    pub fn find_one(&mut self) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::FindOne, |_| Ok(()))
    }

    pub fn find_one_by(&mut self, criteria: impl Into<Criteria>) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::FindOne, |query| {
            query.merge(criteria);
            Ok(())
        })
    }

    /// Binds `count`.
    ///
    /// # Errors
    ///
    /// [`QueryError::Compatibility`](crate::error::QueryError::Compatibility)
    /// when a projection, `batchSize`, `maxScan`, `snapshot` or `tailable` is
    /// already set.
    pub fn count(&mut self) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::Count, |_| Ok(()))
    }

    pub fn count_by(&mut self, criteria: impl Into<Criteria>) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::Count, |query| {
            query.merge(criteria);
            Ok(())
        })
    }

    /// Binds `distinct` over the field declared earlier (through a merge or
    /// [`Query::distinct_on`]).
    pub fn distinct(&mut self) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::Distinct, |_| Ok(()))
    }

    /// Binds `distinct` over `field`.
    pub fn distinct_on(&mut self, field: impl Into<String>) -> QueryResult<&mut Self> {
        let field = field.into();
        self.bind_staged(OperationKind::Distinct, |query| {
            query.spec.distinct = Some(field);
            Ok(())
        })
    }

    /// Merges `criteria`, optionally sets the field, and binds `distinct`.
    pub fn distinct_by(&mut self, criteria: impl Into<Criteria>, field: Option<&str>) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::Distinct, |query| {
            query.merge(criteria);
            if let Some(field) = field {
                query.spec.distinct = Some(field.to_string());
            }
            Ok(())
        })
    }

    /// Merges `update` and binds `updateOne`.
    pub fn update_one(&mut self, update: Document) -> QueryResult<&mut Self> {
        self.bind_update::<Criteria>(OperationKind::UpdateOne, None, Some(update), None)
    }

    pub fn update_one_by(
        &mut self,
        criteria: impl Into<Criteria>,
        update: Document,
        options: Option<Document>,
    ) -> QueryResult<&mut Self> {
        self.bind_update(OperationKind::UpdateOne, Some(criteria), Some(update), options)
    }

    /// Merges `update` and binds `updateMany`.
    pub fn update_many(&mut self, update: Document) -> QueryResult<&mut Self> {
        self.bind_update::<Criteria>(OperationKind::UpdateMany, None, Some(update), None)
    }

    pub fn update_many_by(
        &mut self,
        criteria: impl Into<Criteria>,
        update: Document,
        options: Option<Document>,
    ) -> QueryResult<&mut Self> {
        self.bind_update(OperationKind::UpdateMany, Some(criteria), Some(update), options)
    }

    /// Merges `replacement` and binds `replaceOne`. The update is marked as an
    /// overwrite so it is sent without `$set` folding.
    pub fn replace_one(&mut self, replacement: Document) -> QueryResult<&mut Self> {
        self.bind_update::<Criteria>(OperationKind::ReplaceOne, None, Some(replacement), None)
    }

    pub fn replace_one_by(
        &mut self,
        criteria: impl Into<Criteria>,
        replacement: Document,
        options: Option<Document>,
    ) -> QueryResult<&mut Self> {
        self.bind_update(OperationKind::ReplaceOne, Some(criteria), Some(replacement), options)
    }

    /// Binds `remove`, which deletes every matching document.
    pub fn remove(&mut self) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::Remove, |_| Ok(()))
    }

    pub fn remove_by(&mut self, criteria: impl Into<Criteria>) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::Remove, |query| {
            query.merge(criteria);
            Ok(())
        })
    }

    pub fn delete_one(&mut self) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::DeleteOne, |_| Ok(()))
    }

    pub fn delete_one_by(&mut self, criteria: impl Into<Criteria>) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::DeleteOne, |query| {
            query.merge(criteria);
            Ok(())
        })
    }

    pub fn delete_many(&mut self) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::DeleteMany, |_| Ok(()))
    }

    pub fn delete_many_by(&mut self, criteria: impl Into<Criteria>) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::DeleteMany, |query| {
            query.merge(criteria);
            Ok(())
        })
    }

    /// Binds `findOneAndUpdate` with the update accumulated so far.
    pub fn find_one_and_update(&mut self) -> QueryResult<&mut Self> {
        self.bind_update::<Criteria>(OperationKind::FindOneAndUpdate, None, None, None)
    }

    /// Merges an update document, or another query's update, and binds
    /// `findOneAndUpdate`. The conditions are left untouched.
    pub fn find_one_and_update_with(&mut self, update: impl Into<Criteria>) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::FindOneAndUpdate, |query| {
            query.merge_update(update);
            Ok(())
        })
    }

    /// Merges `criteria`, `update` and `options`, then binds
    /// `findOneAndUpdate`.
    ///
    /// # Errors
    ///
    /// [`QueryError::Compatibility`](crate::error::QueryError::Compatibility)
    /// when a `limit`, `skip`, `batchSize`, `maxScan`, `snapshot` or
    /// `tailable` is present, whether set earlier or passed in `options`.
    pub fn find_one_and_update_by(
        &mut self,
        criteria: impl Into<Criteria>,
        update: Option<Document>,
        options: Option<Document>,
    ) -> QueryResult<&mut Self> {
        self.bind_update(OperationKind::FindOneAndUpdate, Some(criteria), update, options)
    }

    pub fn find_one_and_remove(&mut self) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::FindOneAndRemove, |_| Ok(()))
    }

    /// Merges `criteria` and `options`, then binds `findOneAndRemove`.
    pub fn find_one_and_remove_by(
        &mut self,
        criteria: impl Into<Criteria>,
        options: Option<Document>,
    ) -> QueryResult<&mut Self> {
        self.bind_staged(OperationKind::FindOneAndRemove, |query| {
            query.merge(criteria);
            if let Some(options) = options {
                query.set_options(options)?;
            }
            Ok(())
        })
    }
}
