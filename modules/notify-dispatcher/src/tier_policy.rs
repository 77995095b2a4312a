use std::collections::HashSet;
use std::time::Duration;

use channel_providers::Channel;
use domain::Tier;

/// §4.4 "Tier policy table": which channels each tier may use and how long
/// subscriber delivery is delayed after a glitch is confirmed. Immutable
/// config the dispatcher consults — it never branches on `Tier` directly.
#[derive(Debug, Clone)]
pub struct TierPolicy {
    channels: Vec<(Tier, HashSet<Channel>)>,
    delays: Vec<(Tier, Duration)>,
    daily_caps: Vec<(Channel, u32)>,
}

impl TierPolicy {
    /// Whether `tier` is authorized to use `channel`.
    pub fn allows(&self, tier: Tier, channel: Channel) -> bool {
        self.channels
            .iter()
            .find(|(t, _)| *t == tier)
            .map(|(_, set)| set.contains(&channel))
            .unwrap_or(false)
    }

    /// The per-tier subscriber delivery delay (§4.4's delay table).
    pub fn delay_for(&self, tier: Tier) -> Duration {
        self.delays
            .iter()
            .find(|(t, _)| *t == tier)
            .map(|(_, d)| *d)
            .unwrap_or(Duration::ZERO)
    }

    /// Groups tiers that share an identical delay, so the dispatcher
    /// schedules exactly one [`domain::DispatchJob`] per distinct delay
    /// rather than one per tier.
    pub fn delay_groups(&self) -> Vec<(Vec<Tier>, Duration)> {
        let mut groups: Vec<(Vec<Tier>, Duration)> = Vec::new();
        for (tier, delay) in &self.delays {
            if let Some(group) = groups.iter_mut().find(|(_, d)| d == delay) {
                group.0.push(*tier);
            } else {
                groups.push((vec![*tier], *delay));
            }
        }
        groups
    }

    /// A channel's per-user daily send cap, if the policy caps it at all
    /// (§4.4 "WhatsApp-style per-user daily caps").
    pub fn daily_cap(&self, channel: Channel) -> Option<u32> {
        self.daily_caps
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, cap)| *cap)
    }
}

impl Default for TierPolicy {
    /// §4.4's example rules: free gets email only; each tier up adds
    /// channels cumulatively; pro/elite get the immediate delay tier,
    /// starter waits a day, free waits three.
    fn default() -> Self {
        use Channel::*;
        use Tier::*;

        let free: HashSet<Channel> = [Email].into_iter().collect();
        let mut starter = free.clone();
        starter.insert(Chat);
        let mut pro = starter.clone();
        pro.extend([Sms, Im, RichMessage]);
        let mut elite = pro.clone();
        elite.extend([Webhook, Priority]);

        Self {
            channels: vec![
                (Free, free),
                (Starter, starter),
                (Pro, pro),
                (Elite, elite),
            ],
            delays: vec![
                (Pro, Duration::ZERO),
                (Elite, Duration::ZERO),
                (Starter, Duration::from_secs(24 * 60 * 60)),
                (Free, Duration::from_secs(72 * 60 * 60)),
            ],
            daily_caps: vec![(Sms, 3), (Im, 5)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_grants_are_cumulative_by_tier() {
        let policy = TierPolicy::default();
        assert!(policy.allows(Tier::Free, Channel::Email));
        assert!(!policy.allows(Tier::Free, Channel::Chat));

        assert!(policy.allows(Tier::Starter, Channel::Email));
        assert!(policy.allows(Tier::Starter, Channel::Chat));
        assert!(!policy.allows(Tier::Starter, Channel::Sms));

        assert!(policy.allows(Tier::Pro, Channel::Sms));
        assert!(policy.allows(Tier::Pro, Channel::Im));
        assert!(policy.allows(Tier::Pro, Channel::RichMessage));
        assert!(!policy.allows(Tier::Pro, Channel::Webhook));

        assert!(policy.allows(Tier::Elite, Channel::Webhook));
        assert!(policy.allows(Tier::Elite, Channel::Priority));
    }

    #[test]
    fn pro_and_elite_share_the_zero_delay_group() {
        let policy = TierPolicy::default();
        let groups = policy.delay_groups();
        let zero_group = groups
            .iter()
            .find(|(_, d)| *d == Duration::ZERO)
            .expect("a zero-delay group must exist");
        assert!(zero_group.0.contains(&Tier::Pro));
        assert!(zero_group.0.contains(&Tier::Elite));
    }

    #[test]
    fn starter_and_free_delays_match_the_spec_table() {
        let policy = TierPolicy::default();
        assert_eq!(policy.delay_for(Tier::Starter), Duration::from_secs(86_400));
        assert_eq!(policy.delay_for(Tier::Free), Duration::from_secs(259_200));
    }

    #[test]
    fn sms_and_im_carry_daily_caps_other_channels_do_not() {
        let policy = TierPolicy::default();
        assert_eq!(policy.daily_cap(Channel::Sms), Some(3));
        assert_eq!(policy.daily_cap(Channel::Im), Some(5));
        assert_eq!(policy.daily_cap(Channel::Email), None);
    }
}
