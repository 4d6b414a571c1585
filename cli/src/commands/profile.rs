use anyhow::{Result, bail};

use fittrack_core::models::UpdateProfile;
use fittrack_core::service::FitTrackService;

use super::helpers::{fmt_amount, print_json, weight_to_kg};

/// Values from `fittrack profile set`, still as typed on the command line.
pub(crate) struct ProfileArgs {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub age: Option<i64>,
    pub weight: Option<f64>,
    pub unit: String,
    pub height: Option<f64>,
    pub goal: Option<String>,
    pub diet: Option<String>,
}

impl ProfileArgs {
    fn into_update(self) -> Result<UpdateProfile> {
        Ok(UpdateProfile {
            full_name: self.name,
            gender: self.gender.as_deref().map(str::parse).transpose()?,
            age: self.age,
            weight_kg: self.weight.map(|w| weight_to_kg(w, &self.unit)).transpose()?,
            height_cm: self.height,
            goal: self.goal.as_deref().map(str::parse).transpose()?,
            diet_preference: self.diet.as_deref().map(str::parse).transpose()?,
        })
    }
}

pub(crate) fn cmd_profile_show(svc: &FitTrackService, user: &str, json: bool) -> Result<()> {
    let Some(profile) = svc.get_profile(user)? else {
        if json {
            println!("null");
        } else {
            eprintln!("No profile yet. Use `fittrack profile set` to create one.");
        }
        return Ok(());
    };

    if json {
        return print_json(&profile);
    }

    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    println!("User:     {}", profile.user_id);
    println!("Name:     {}", or_dash(profile.full_name.clone()));
    println!("Gender:   {}", or_dash(profile.gender.map(|g| g.to_string())));
    println!("Age:      {}", or_dash(profile.age.map(|a| a.to_string())));
    println!(
        "Weight:   {}",
        or_dash(profile.weight_kg.map(|w| format!("{} kg", fmt_amount(w))))
    );
    println!(
        "Height:   {}",
        or_dash(profile.height_cm.map(|h| format!("{} cm", fmt_amount(h))))
    );
    println!("Goal:     {}", or_dash(profile.goal.map(|g| g.phrase())));
    println!("Diet:     {}", profile.diet_preference);
    if profile.generation_profile().is_none() {
        println!("\nSet gender, age, weight and goal to enable plan generation.");
    }

    Ok(())
}

pub(crate) fn cmd_profile_set(
    svc: &FitTrackService,
    user: &str,
    args: ProfileArgs,
    json: bool,
) -> Result<()> {
    let update = args.into_update()?;
    if update.is_empty() {
        bail!("Nothing to update. Pass at least one of --name, --gender, --age, --weight, --height, --goal, --diet");
    }
    let profile = svc.update_profile(user, &update)?;

    if json {
        print_json(&profile)?;
    } else {
        println!("Profile updated for {}", profile.user_id);
    }

    Ok(())
}
