use std::io::Write;

use crate::domain::registration::Registration;
use crate::domain::team::Team;
use crate::error::Result;

/// Writes the final state as CSV: one row per team, then one row per
/// registration, both sorted for deterministic output.
///
/// Columns: `kind,name,detail,status,amount_paid,checked_in`. For teams,
/// `name` is the team name, `detail` the member count and `status` the lock
/// state; for registrations, `name` is the event id and `detail` the owning
/// team's name.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(destination: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(destination),
        }
    }

    pub fn write_report(
        &mut self,
        mut teams: Vec<Team>,
        mut registrations: Vec<Registration>,
    ) -> Result<()> {
        self.writer
            .write_record(["kind", "name", "detail", "status", "amount_paid", "checked_in"])?;

        teams.sort_by(|a, b| a.name.cmp(&b.name));
        let team_name = |team_id: &crate::domain::team::TeamId, teams: &[Team]| {
            teams
                .iter()
                .find(|t| t.id == *team_id)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| team_id.to_string())
        };

        registrations.sort_by(|a, b| {
            (a.event.as_str(), a.team.as_str()).cmp(&(b.event.as_str(), b.team.as_str()))
        });

        for team in &teams {
            self.writer.write_record([
                "team",
                &team.name,
                &team.members.len().to_string(),
                if team.locked { "locked" } else { "open" },
                "",
                "",
            ])?;
        }

        for reg in &registrations {
            self.writer.write_record([
                "registration",
                reg.event.as_str(),
                &team_name(&reg.team, &teams),
                &reg.status.to_string(),
                &reg.amount_paid.to_string(),
                &reg.checked_in.to_string(),
            ])?;
        }

        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::EventId;
    use crate::domain::profile::ProfileId;
    use crate::domain::team::TeamId;
    use rust_decimal_macros::dec;

    #[test]
    fn test_report_layout() {
        let mut team = Team::new(TeamId::new("t1"), "Orion", ProfileId::new("p1"));
        team.lock();

        let mut reg = Registration::new(
            TeamId::new("t1"),
            EventId::new("hackathon"),
            dec!(400),
            vec![ProfileId::new("p1")],
        );
        reg.record_order("order_1".to_string());
        reg.capture("pay_1", dec!(400));

        let mut out = Vec::new();
        ReportWriter::new(&mut out)
            .write_report(vec![team], vec![reg])
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "kind,name,detail,status,amount_paid,checked_in");
        assert_eq!(lines[1], "team,Orion,1,locked,,");
        assert_eq!(lines[2], "registration,hackathon,Orion,paid,400,false");
    }

    #[test]
    fn test_registrations_sorted_by_event_then_team() {
        let alpha = Team::new(TeamId::new("t1"), "Alpha", ProfileId::new("p1"));
        let beta = Team::new(TeamId::new("t2"), "Beta", ProfileId::new("p2"));

        let mk = |team: &Team, event: &str| {
            Registration::new(
                team.id.clone(),
                EventId::new(event),
                dec!(0),
                vec![team.leader.clone()],
            )
        };
        let regs = vec![mk(&beta, "quiz"), mk(&alpha, "quiz"), mk(&beta, "chess")];

        let mut out = Vec::new();
        ReportWriter::new(&mut out)
            .write_report(vec![alpha, beta], regs)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let order: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with("registration"))
            .collect();
        assert!(order[0].starts_with("registration,chess,Beta"));
        assert!(order[1].starts_with("registration,quiz,Alpha"));
        assert!(order[2].starts_with("registration,quiz,Beta"));
    }
}
