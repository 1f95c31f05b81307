//! Terminal dispatch to the database collaborator

use log::debug;

use super::{
    request::{Operation, Outcome, Request},
    traits::Queryer,
};

/// Run the request's statement against the collaborator and record the result.
///
/// Exactly one collaborator method is called, chosen by the operation, using
/// the caller's context. A context that is already done is reported without
/// touching the collaborator.
pub(crate) fn dispatch<Q: Queryer>(queryer: &Q, req: &mut Request<Q>) {
    req.mark_dispatched();

    if let Some(err) = req.context().err() {
        debug!(operation = req.operation().as_str(); "Skipping dispatch: {err}");
        req.set_error(err);
        return;
    }

    debug!(operation = req.operation().as_str(), args = req.args().len(); "Dispatching statement");

    match req.operation() {
        Operation::Exec => match queryer.exec(req.context(), req.query(), req.args()) {
            Ok(result) => req.resolve(Outcome::Exec(result)),
            Err(err) => req.set_error(err),
        },
        Operation::QueryMany => match queryer.query_many(req.context(), req.query(), req.args()) {
            Ok(rows) => req.resolve(Outcome::Rows(rows)),
            Err(err) => req.set_error(err),
        },
        Operation::QueryOne => {
            let row = queryer.query_one(req.context(), req.query(), req.args());
            req.resolve(Outcome::Row(row));
        }
    }
}
