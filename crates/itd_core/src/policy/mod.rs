use crate::domain::{Actor, Incident, Role};
use crate::predicate::Predicate;

/// Visibility predicate for an actor. Every query ANDs its filters onto this, so no
/// request parameter can widen what an actor sees.
///
/// - system admin: everything
/// - sector admin: unclaimed incidents of their sector, plus anything they resolved
///   themselves; never incidents claimed by another admin
/// - user: only incidents they reported
pub fn visible_predicate(actor: &Actor) -> Predicate {
    match actor.role {
        Role::SystemAdmin => Predicate::All,
        Role::SectorAdmin(sector) => Predicate::Or(vec![
            Predicate::ResolverIs(actor.id),
            Predicate::And(vec![
                Predicate::ResolverIsNull,
                Predicate::CategoryIn(vec![sector]),
            ]),
        ]),
        Role::User => Predicate::ReporterIs(actor.id),
    }
}

pub fn can_view(actor: &Actor, incident: &Incident) -> bool {
    visible_predicate(actor).matches(incident)
}
