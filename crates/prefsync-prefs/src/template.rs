//! The built-in default preference document.

/// Default document body, used when a mailbox holds no usable
/// preference email or when a defective body is replaced wholesale.
pub const DEFAULT_TEMPLATE: &str = r#"<?xml version="1.0"?>
<preferences>
    <preference name="hideEmailAddresses">false</preference>
    <preference name="dateSeparatorChar">/</preference>
    <preference name="signatureActiveForForwards">true</preference>
    <preference name="newMailSound"/>
    <preference name="autoLoginActive">false</preference>
    <preference name="freeBusyPublishInterval">5</preference>
    <preference name="dirSearchOrder">system,personal</preference>
    <preference name="calendarsPaneVisible">true</preference>
    <preference name="locale">en_US</preference>
    <preference name="messagePaneVisible">true</preference>
    <preference name="defaultCalendarView">0</preference>
    <preference name="todoPaneVisible">false</preference>
    <preference name="from">sxadmin-test@allwebsuite.com</preference>
    <preference name="timeSeparatorChar">:</preference>
    <preference name="msgCompositionFontFamily">times new roman, new york, times, serif</preference>
    <preference name="signatureText"></preference>
    <preference name="includeMessageOnReply">true</preference>
    <preference name="useRichText">true</preference>
    <preference name="preferredDateTimeFormat">1</preference>
    <preference name="weekStart">0</preference>
    <preference name="miniCalendarPaneVisible">true</preference>
    <preference name="msgCompositionFontSize">3</preference>
    <preference name="signatureActiveForReplies">true</preference>
    <preference name="workDayEnd">1020</preference>
    <preference name="upcomingAppointmentsRange">7</preference>
    <preference name="timeWindowSize">ONE_MONTH</preference>
    <preference name="workWeek">1,2,3,4,5</preference>
    <preference name="workDayStart">480</preference>
    <preference name="foldersPaneVisible">true</preference>
    <preference name="modePaneVisible">true</preference>
    <preference name="refreshFolderList"/>
    <preference name="themesSelectedThemeId">scalix-default</preference>
    <preference name="freeBusyPublishRange">2</preference>
    <preference name="autoAcknowledgeReadReceipts">true</preference>
    <preference name="calendarSetsPaneVisible">false</preference>
    <preference name="showBcc">false</preference>
    <preference name="autoSpellCheck">false</preference>
    <preference name="blockRemoteImages">true</preference>
    <preference name="signatureActiveForNewMessages">true</preference>
    <preference name="eventsPaneVisible">true</preference>
</preferences>
"#;
