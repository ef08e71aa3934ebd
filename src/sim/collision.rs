//! Contact classification and strike rules
//!
//! The physics world reports collision starts as body pairs. This module
//! decides what a pair means by label, and whether an object touching the
//! player actually hurts. Applying the outcome (lives, sounds, removal) is
//! the game loop's job.

use glam::Vec2;

use crate::physics::{BodyHandle, BodyLabel, PhysicsWorld};

/// Meaning of a collision-start pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    PlayerObject(BodyHandle),
    PlayerPowerUp(BodyHandle),
    /// Player touched the ground or a resting object
    PlayerSupport,
    ObjectGround(BodyHandle),
    /// Two falling objects; either may be resting
    ObjectObject(BodyHandle, BodyHandle),
    /// Nothing gameplay-relevant (stale handle, sensor overlap, ...)
    Other,
}

/// Classify a pair by body labels. Order within the pair does not matter.
pub fn classify<W: PhysicsWorld>(pair: (BodyHandle, BodyHandle), world: &W) -> Contact {
    let (a, b) = pair;
    let (Some(la), Some(lb)) = (world.label(a), world.label(b)) else {
        return Contact::Other;
    };
    use BodyLabel::*;
    match (la, lb) {
        (Player, Object) => Contact::PlayerObject(b),
        (Object, Player) => Contact::PlayerObject(a),
        (Player, PowerUp) => Contact::PlayerPowerUp(b),
        (PowerUp, Player) => Contact::PlayerPowerUp(a),
        (Player, Ground) | (Ground, Player) => Contact::PlayerSupport,
        (Object, Ground) => Contact::ObjectGround(a),
        (Ground, Object) => Contact::ObjectGround(b),
        (Object, Object) => Contact::ObjectObject(a, b),
        _ => Contact::Other,
    }
}

/// Verdict for an object touching the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strike {
    /// Costs a life
    Hit,
    /// Glancing contact: bump, no damage
    Graze,
    /// Absorbed by invincibility, silently
    Shielded,
    /// Already counted, or inside the post-hit grace window
    Ignored,
}

impl Strike {
    /// The object has had its one interaction with the player
    pub fn marks_object(&self) -> bool {
        !matches!(self, Strike::Ignored)
    }
}

/// Player-side conditions at the moment of contact
#[derive(Debug, Clone, Copy)]
pub struct StrikeContext {
    pub invincible: bool,
    pub in_grace: bool,
    /// Minimum downward speed for a damaging hit
    pub min_impact_speed: f32,
}

/// Judge an object/player contact.
///
/// Damage needs the object's center above the player's and a downward speed
/// of at least `min_impact_speed`; anything else is a graze.
pub fn judge_strike(
    object_pos: Vec2,
    object_vel: Vec2,
    player_pos: Vec2,
    already_struck: bool,
    ctx: &StrikeContext,
) -> Strike {
    if already_struck {
        return Strike::Ignored;
    }
    if ctx.invincible {
        return Strike::Shielded;
    }
    let from_above = object_pos.y < player_pos.y;
    if from_above && object_vel.y >= ctx.min_impact_speed {
        if ctx.in_grace {
            Strike::Ignored
        } else {
            Strike::Hit
        }
    } else {
        Strike::Graze
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{BodySpec, Collider, KinematicWorld};

    const PLAYER: Vec2 = Vec2::new(400.0, 550.0);

    fn ctx() -> StrikeContext {
        StrikeContext {
            invincible: false,
            in_grace: false,
            min_impact_speed: 1.0,
        }
    }

    #[test]
    fn test_fast_hit_from_above() {
        let s = judge_strike(Vec2::new(400.0, 520.0), Vec2::new(0.0, 4.0), PLAYER, false, &ctx());
        assert_eq!(s, Strike::Hit);
    }

    #[test]
    fn test_slow_or_side_contact_is_graze() {
        let slow = judge_strike(Vec2::new(400.0, 520.0), Vec2::new(0.0, 0.5), PLAYER, false, &ctx());
        assert_eq!(slow, Strike::Graze);
        let below = judge_strike(Vec2::new(400.0, 560.0), Vec2::new(0.0, 4.0), PLAYER, false, &ctx());
        assert_eq!(below, Strike::Graze);
    }

    #[test]
    fn test_invincible_absorbs_silently() {
        let c = StrikeContext {
            invincible: true,
            ..ctx()
        };
        let s = judge_strike(Vec2::new(400.0, 500.0), Vec2::new(0.0, 9.0), PLAYER, false, &c);
        assert_eq!(s, Strike::Shielded);
        assert!(s.marks_object());
    }

    #[test]
    fn test_each_object_strikes_once_and_grace() {
        let s = judge_strike(Vec2::new(400.0, 500.0), Vec2::new(0.0, 9.0), PLAYER, true, &ctx());
        assert_eq!(s, Strike::Ignored);
        let c = StrikeContext {
            in_grace: true,
            ..ctx()
        };
        let s = judge_strike(Vec2::new(400.0, 500.0), Vec2::new(0.0, 9.0), PLAYER, false, &c);
        assert_eq!(s, Strike::Ignored);
        assert!(!s.marks_object());
    }

    #[test]
    fn test_classify_is_order_independent() {
        let mut world = KinematicWorld::new(0.0);
        let rect = Collider::Rect { half: Vec2::splat(10.0) };
        let player = world.create_body(&BodySpec::new(BodyLabel::Player, rect.clone()), Vec2::ZERO);
        let object = world.create_body(&BodySpec::new(BodyLabel::Object, rect.clone()), Vec2::ZERO);
        let ground = world.create_body(&BodySpec::new(BodyLabel::Ground, rect).fixed(), Vec2::ZERO);

        assert_eq!(classify((player, object), &world), Contact::PlayerObject(object));
        assert_eq!(classify((object, player), &world), Contact::PlayerObject(object));
        assert_eq!(classify((ground, object), &world), Contact::ObjectGround(object));
        assert_eq!(classify((player, ground), &world), Contact::PlayerSupport);

        world.remove_body(object);
        assert_eq!(classify((player, object), &world), Contact::Other);
    }
}
