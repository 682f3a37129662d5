//! Generates the candid file automatically

use auto_compounder::Compounder;

fn main() {
    let canister_idl = Compounder::idl();
    let idl = candid::pretty::candid::compile(&canister_idl.env.env, &Some(canister_idl.actor));

    println!("{}", idl);
}
